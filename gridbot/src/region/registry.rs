use std::collections::BTreeMap;

use corelib::models::{RegionId, ZoneTable};

use crate::config::{AppConfig, RegionCredentials};

#[derive(Clone, Debug)]
pub struct RegionEntry {
    pub region: RegionId,
    pub display_name: &'static str,
    pub credentials: RegionCredentials,
}

/// Regions this process announces for, built once at startup.
#[derive(Clone, Debug)]
pub struct RegionRegistry {
    entries: BTreeMap<RegionId, RegionEntry>,
    zones: ZoneTable,
}

impl RegionRegistry {
    pub fn new(zones: ZoneTable) -> Self {
        Self {
            entries: BTreeMap::new(),
            zones,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        cfg.credentials
            .iter()
            .cloned()
            .fold(Self::new(cfg.zones.clone()), |mut reg, creds| {
                reg.register(creds);
                reg
            })
    }

    /// Adds (or replaces) a region.
    pub fn register(&mut self, credentials: RegionCredentials) {
        let region = credentials.region;
        self.entries.insert(
            region,
            RegionEntry {
                region,
                display_name: region.display_name(),
                credentials,
            },
        );
    }

    pub fn get(&self, region: RegionId) -> Option<&RegionEntry> {
        self.entries.get(&region)
    }

    pub fn contains(&self, region: RegionId) -> bool {
        self.entries.contains_key(&region)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(region: RegionId, client_id: &str) -> RegionCredentials {
        RegionCredentials {
            region,
            client_id: client_id.into(),
            client_secret: String::new(),
            user_email: String::new(),
            user_password: String::new(),
        }
    }

    #[test]
    fn registers_regions_with_display_names() {
        let mut reg = RegionRegistry::new(ZoneTable::default());
        reg.register(creds(RegionId::Nsw1, "nsw"));
        reg.register(creds(RegionId::Qld1, "qld"));

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(RegionId::Nsw1).unwrap().display_name, "New South Wales");
        assert!(!reg.contains(RegionId::Tas1));

        // Ordered by region id.
        let order: Vec<RegionId> = reg.entries().map(|e| e.region).collect();
        assert_eq!(order, vec![RegionId::Qld1, RegionId::Nsw1]);
    }

    #[test]
    fn builds_from_config() {
        let cfg = AppConfig::from_lookup(|k| match k {
            "TEST_MODE" => Some("true".into()),
            "GRIDBOT_CREDENTIALS" => Some(
                r#"[{"RegionID": "VIC1", "MastodonClientID": "vic"}, {"RegionID": "TAS1"}]"#.into(),
            ),
            _ => None,
        })
        .unwrap();

        let reg = RegionRegistry::from_config(&cfg);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(RegionId::Vic1).unwrap().credentials.client_id, "vic");
    }
}
