use shot_core::errors::{ErrorInfo, ShotError};
use shot_rule::{Accessor, Column};

use crate::alias::AliasMap;
use crate::dataset::Dataset;
use crate::shot_file::ShotFile;

/// Rule accessor over one shot file.
///
/// Keywords are alias-resolved on every call. Datasets holding one value per
/// shot become per-shot columns; single values broadcast as scalars.
#[derive(Debug, Clone, Copy)]
pub struct FileAccessor<'a> {
    file: &'a ShotFile,
    aliases: &'a AliasMap,
    shots: usize,
}

impl<'a> FileAccessor<'a> {
    /// Binds a file, its alias map and its declared shot count.
    pub fn new(file: &'a ShotFile, aliases: &'a AliasMap, shots: usize) -> Self {
        Self {
            file,
            aliases,
            shots,
        }
    }

    fn shape_error(&self, keyword: &str, path: &str, shape: &[usize]) -> ShotError {
        ShotError::Rule(
            ErrorInfo::new("keyword_shape", "keyword is neither per-shot nor scalar")
                .with_context("keyword", keyword)
                .with_context("dataset", path)
                .with_context("shape", format!("{shape:?}"))
                .with_context("shots", self.shots.to_string()),
        )
    }
}

impl Accessor for FileAccessor<'_> {
    fn column(&self, keyword: &str) -> Result<Column, ShotError> {
        let path = self.aliases.resolve(keyword);
        let dataset = self.file.dataset(path).ok_or_else(|| {
            ShotError::Store(
                ErrorInfo::new("missing_dataset", "rule keyword not found in file")
                    .with_context("keyword", keyword)
                    .with_context("dataset", path),
            )
        })?;
        match dataset {
            Dataset::Numeric(array) => {
                if array.len() == 1 {
                    Ok(Column::NumericScalar(array.data()[0]))
                } else if array.rows() == self.shots && array.len() == self.shots {
                    Ok(Column::Numeric(array.data().to_vec()))
                } else {
                    Err(self.shape_error(keyword, path, array.shape()))
                }
            }
            Dataset::Text { values } => {
                if values.len() == 1 && self.shots != 1 {
                    Ok(Column::TextScalar(values[0].clone()))
                } else if values.len() == self.shots {
                    Ok(Column::Text(values.clone()))
                } else {
                    Err(self.shape_error(keyword, path, &[values.len()]))
                }
            }
        }
    }
}
