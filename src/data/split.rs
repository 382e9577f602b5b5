//! Meta-class splits

use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Disjoint class lists for the three meta modes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaClassSplit {
    pub meta_train: Vec<String>,
    pub meta_val: Vec<String>,
    pub meta_test: Vec<String>,
}

/// Split `classes` into meta_train, meta_val and meta_test.
///
/// `ratio` holds the class count of each split and must add up to the number
/// of classes. With `shuffle_seed` the classes are shuffled first.
pub fn split_meta_classes(
    classes: &[String],
    ratio: [usize; 3],
    shuffle_seed: Option<u64>,
) -> Result<MetaClassSplit> {
    let total: usize = ratio.iter().sum();
    if total != classes.len() {
        return Err(Error::ClassSplit {
            ratio,
            total,
            available: classes.len(),
        });
    }

    let mut classes = classes.to_vec();
    if let Some(seed) = shuffle_seed {
        classes.shuffle(&mut StdRng::seed_from_u64(seed));
    }

    let meta_test = classes.split_off(ratio[0] + ratio[1]);
    let meta_val = classes.split_off(ratio[0]);
    Ok(MetaClassSplit {
        meta_train: classes,
        meta_val,
        meta_test,
    })
}

impl MetaClassSplit {
    /// Write the split as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Reuse the split stored at `path` unless `generate_new` is set or the
    /// file is absent, in which case a fresh split is computed and saved.
    pub fn load_or_create(
        path: impl AsRef<Path>,
        classes: &[String],
        ratio: [usize; 3],
        shuffle_seed: Option<u64>,
        generate_new: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !generate_new && path.exists() {
            tracing::debug!(path = %path.display(), "reusing stored class split");
            return Self::load(path);
        }

        let split = split_meta_classes(classes, ratio, shuffle_seed)?;
        split.save(path)?;
        tracing::info!(
            meta_train = split.meta_train.len(),
            meta_val = split.meta_val.len(),
            meta_test = split.meta_test.len(),
            "created class split"
        );
        Ok(split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("class_{i}")).collect()
    }

    #[test]
    fn test_split_in_order() {
        let split = split_meta_classes(&names(6), [3, 2, 1], None).unwrap();
        assert_eq!(split.meta_train, vec!["class_0", "class_1", "class_2"]);
        assert_eq!(split.meta_val, vec!["class_3", "class_4"]);
        assert_eq!(split.meta_test, vec!["class_5"]);
    }

    #[test]
    fn test_ratio_must_cover_all_classes() {
        let err = split_meta_classes(&names(5), [3, 2, 1], None).unwrap_err();
        assert!(matches!(
            err,
            Error::ClassSplit {
                total: 6,
                available: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_shuffle_is_seeded_and_complete() {
        let a = split_meta_classes(&names(10), [5, 3, 2], Some(7)).unwrap();
        let b = split_meta_classes(&names(10), [5, 3, 2], Some(7)).unwrap();
        assert_eq!(a, b);

        let mut all: Vec<String> = a
            .meta_train
            .into_iter()
            .chain(a.meta_val)
            .chain(a.meta_test)
            .collect();
        all.sort();
        let mut expected = names(10);
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_load_or_create_reuses_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta_classes.json");

        let first = MetaClassSplit::load_or_create(&path, &names(3), [1, 1, 1], None, false).unwrap();
        assert!(path.exists());

        // A different class list is ignored while the stored split is reused
        let reused = MetaClassSplit::load_or_create(&path, &names(4), [2, 1, 1], None, false).unwrap();
        assert_eq!(reused, first);

        let fresh = MetaClassSplit::load_or_create(&path, &names(4), [2, 1, 1], None, true).unwrap();
        assert_eq!(fresh.meta_train.len(), 2);
        assert_eq!(MetaClassSplit::load(&path).unwrap(), fresh);
    }
}
