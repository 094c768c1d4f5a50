use serde::{Deserialize, Serialize};
use std::fmt;

/// Which split of the dataset is being requested.
/// On disk each usage is a sub-directory of the data root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Usage {
    Train,
    Validation,
}

impl Usage {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Usage::Train      => "train",
            Usage::Validation => "validation",
        }
    }
}

impl Default for Usage {
    fn default() -> Self {
        Usage::Train
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
