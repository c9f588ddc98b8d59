use super::ModelError;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::info;

/// Word symbol table (`words.txt`): one `<word> <id>` pair per line
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    words: HashMap<u32, String>,
}

impl SymbolTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        info!("Loading words from {}", path.display());

        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file)?;

        info!("Loaded {} word symbols", table.len());
        Ok(table)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ModelError> {
        let mut words = HashMap::new();

        for (index, line) in BufReader::new(reader).lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|e| ModelError::SymbolTable {
                line: line_no,
                message: e.to_string(),
            })?;

            let mut fields = line.split_whitespace();
            let (word, id) = match (fields.next(), fields.next(), fields.next()) {
                (None, _, _) => continue,
                (Some(word), Some(id), None) => (word, id),
                _ => {
                    return Err(ModelError::SymbolTable {
                        line: line_no,
                        message: format!("expected `<word> <id>`, got {:?}", line),
                    })
                }
            };

            let id: u32 = id.parse().map_err(|_| ModelError::SymbolTable {
                line: line_no,
                message: format!("invalid symbol id {:?}", id),
            })?;

            words.insert(id, word.to_string());
        }

        Ok(Self { words })
    }

    pub fn find(&self, id: u32) -> Option<&str> {
        self.words.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for SymbolTable {
    fn from_iter<T: IntoIterator<Item = (u32, S)>>(iter: T) -> Self {
        Self {
            words: iter.into_iter().map(|(id, w)| (id, w.into())).collect(),
        }
    }
}
