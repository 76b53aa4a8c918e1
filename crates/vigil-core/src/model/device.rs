// ── Device name directory ──

use std::collections::BTreeMap;

/// Names the sensors the backend ships with.
const BUILT_IN: [(&str, &str); 2] = [("d239", "Door Sensor"), ("d254", "Motion Detector")];

/// Static device id → display name lookup used to enrich live events.
#[derive(Debug, Clone)]
pub struct DeviceDirectory {
    names: BTreeMap<String, String>,
}

impl Default for DeviceDirectory {
    fn default() -> Self {
        Self::with_overrides(&BTreeMap::new())
    }
}

impl DeviceDirectory {
    /// Built-in names with `overrides` layered on top.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut names: BTreeMap<String, String> = BUILT_IN
            .iter()
            .map(|(id, name)| ((*id).to_owned(), (*name).to_owned()))
            .collect();
        names.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { names }
    }

    /// Display name for `device_id`. Unknown ids pass through unchanged;
    /// no id gives no name.
    pub fn resolve(&self, device_id: Option<&str>) -> Option<String> {
        let id = device_id?;
        Some(self.names.get(id).cloned().unwrap_or_else(|| id.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_names_resolve() {
        let dir = DeviceDirectory::default();
        assert_eq!(dir.resolve(Some("d239")).as_deref(), Some("Door Sensor"));
        assert_eq!(dir.resolve(Some("d254")).as_deref(), Some("Motion Detector"));
    }

    #[test]
    fn unknown_ids_pass_through_and_missing_ids_stay_empty() {
        let dir = DeviceDirectory::default();
        assert_eq!(dir.resolve(Some("d999")).as_deref(), Some("d999"));
        assert_eq!(dir.resolve(None), None);
    }

    #[test]
    fn overrides_win_over_built_ins() {
        let overrides = BTreeMap::from([
            ("d239".to_owned(), "Front door".to_owned()),
            ("d300".to_owned(), "Garage".to_owned()),
        ]);
        let dir = DeviceDirectory::with_overrides(&overrides);
        assert_eq!(dir.resolve(Some("d239")).as_deref(), Some("Front door"));
        assert_eq!(dir.resolve(Some("d300")).as_deref(), Some("Garage"));
        assert_eq!(dir.iter().count(), 3);
    }
}
