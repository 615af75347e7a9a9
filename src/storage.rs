use anyhow::{bail, Context, Result};
use faceprep_vision::{CanonicalTemplate, LandmarkSet, ReferencePair};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const TEMPLATE_FILE_NAME: &str = "canonical_template.json";

/// A canonical template as written to disk, so later runs can align against
/// the same reference population.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateRecord {
    pub id: String,
    /// Names of the faces the template was averaged from.
    pub created_from: Vec<String>,
    pub reference: [usize; 2],
    pub points: Vec<[f64; 2]>,
}

impl TemplateRecord {
    pub fn new(template: &CanonicalTemplate, created_from: Vec<String>) -> Self {
        let reference = template.reference();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_from,
            reference: [reference.left, reference.right],
            points: template.points().to_xy(),
        }
    }

    /// Rebuilds the template, requiring it to use the configured reference pair.
    pub fn to_template(&self, expected: ReferencePair) -> Result<CanonicalTemplate> {
        let [left, right] = self.reference;
        if (left, right) != (expected.left, expected.right) {
            bail!(
                "template {} uses reference pair {left}/{right}, configured {}/{}",
                self.id,
                expected.left,
                expected.right
            );
        }
        CanonicalTemplate::from_points(
            LandmarkSet::from_xy(&self.points),
            ReferencePair::new(left, right),
        )
        .with_context(|| format!("template {}", self.id))
    }
}

pub fn load_template(path: &Path) -> Result<TemplateRecord> {
    let data =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

pub fn save_template(path: &Path, record: &TemplateRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(record)?;
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceprep_vision::normalize;

    fn template() -> CanonicalTemplate {
        let set = LandmarkSet::from_xy(&[[0.0, 0.0], [10.0, 1.0], [5.0, 8.0]]);
        let n = normalize(&set, ReferencePair::default()).unwrap();
        CanonicalTemplate::build([("a", &n)], ReferencePair::default()).unwrap()
    }

    #[test]
    fn test_persisted_template_is_identical() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        let path = dir.join(TEMPLATE_FILE_NAME);
        let t = template();
        let record = TemplateRecord::new(&t, vec!["a".into()]);
        save_template(&path, &record).unwrap();

        let loaded = load_template(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.to_template(ReferencePair::default()).unwrap(), t);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_reference_pair_must_match() {
        let record = TemplateRecord::new(&template(), vec![]);
        assert!(record.to_template(ReferencePair::new(1, 2)).is_err());
    }
}
