//! Canonical source, destination and log paths for a run.
//!
//! Layout:
//! - source:      `{source_root}/{merfish_<category>}/{run}`
//! - destination: `{destination_root}/{run}/{category}`
//! - log:         `{destination_root}/{run}/{category}.log`

use std::collections::BTreeMap;

use crate::config::DriveProfile;
use crate::model::{Category, CopySet, PathSet, RunId};

/// Build the path set for a single category.
pub fn resolve_category(run_id: &RunId, profile: &DriveProfile, category: Category) -> PathSet {
    let destination_parent = profile.destination_root.join(run_id.as_str());

    PathSet {
        source: profile
            .source_root
            .join(category.source_subdir())
            .join(run_id.as_str()),
        destination: destination_parent.join(category.destination_subdir()),
        log: destination_parent.join(format!("{}.log", category.destination_subdir())),
        destination_parent,
    }
}

/// Build path sets for every selected category.
pub fn resolve(
    run_id: &RunId,
    profile: &DriveProfile,
    copy_set: &CopySet,
) -> BTreeMap<Category, PathSet> {
    copy_set
        .iter()
        .map(|category| (category, resolve_category(run_id, profile, category)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use std::path::PathBuf;

    fn profile() -> DriveProfile {
        DriveProfile {
            platform: Platform::Linux,
            source_root: PathBuf::from("/data/instrument"),
            destination_root: PathBuf::from("/archive"),
            log_root: PathBuf::from("/archive/logs"),
            tool_options: "-av".to_string(),
            tool_path: None,
        }
    }

    #[test]
    fn test_resolve_layout() {
        let run = RunId::new("202310261058_VZGEN1_VMSC10202").unwrap();
        let paths = resolve_category(&run, &profile(), Category::RawData);

        assert_eq!(
            paths.source,
            PathBuf::from("/data/instrument/merfish_raw_data/202310261058_VZGEN1_VMSC10202")
        );
        assert_eq!(
            paths.destination,
            PathBuf::from("/archive/202310261058_VZGEN1_VMSC10202/raw_data")
        );
        assert_eq!(
            paths.log,
            PathBuf::from("/archive/202310261058_VZGEN1_VMSC10202/raw_data.log")
        );
        assert_eq!(
            paths.destination_parent,
            PathBuf::from("/archive/202310261058_VZGEN1_VMSC10202")
        );
    }

    #[test]
    fn test_resolve_only_selected_categories() {
        let run = RunId::new("RUN").unwrap();
        let copy_set = CopySet::new([Category::Output, Category::Analysis]).unwrap();
        let all = resolve(&run, &profile(), &copy_set);

        assert_eq!(all.len(), 2);
        assert!(!all.contains_key(&Category::RawData));
        assert_eq!(
            all[&Category::Analysis].source,
            PathBuf::from("/data/instrument/merfish_analysis/RUN")
        );
        assert_eq!(
            all[&Category::Output].log,
            PathBuf::from("/archive/RUN/output.log")
        );
    }
}
