use serde::{Deserialize, Serialize};

use crate::{
    error::{FatError, FatResult},
    BLOCK_SIZE, MAX_CHAIN_BLOCKS,
};

/// Engine tunables. Every field has a default, so an empty JSON object is a
/// valid config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatConfig {
    /// Characters per block payload.
    pub block_size: usize,
    /// Hard bound on blocks visited in one traversal.
    pub max_chain_blocks: usize,
}

impl Default for FatConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            max_chain_blocks: MAX_CHAIN_BLOCKS,
        }
    }
}

impl FatConfig {
    pub fn from_json(bytes: &[u8]) -> FatResult<Self> {
        let config: FatConfig = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FatResult<()> {
        if self.block_size == 0 || self.max_chain_blocks == 0 {
            return Err(FatError::Codec(alloc::format!(
                "block_size and max_chain_blocks must be positive: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Blocks needed to hold `chars` characters.
    pub fn blocks_for(&self, chars: usize) -> usize {
        chars.div_ceil(self.block_size)
    }
}
