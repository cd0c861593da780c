//! Color registry.
//!
//! Each registered color maps to the root-chain token contract it
//! represents. Colors are handed out in order inside their kind's range,
//! so the kind of a color never has to be stored.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use shared_types::{short_hex, Address, Asset, Color, ColorKind};
use tracing::info;

use super::error::{ExitError, ExitResult};

/// Registered colors and per-kind counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorRegistry {
    tokens: BTreeMap<Color, Address>,
    counters: HashMap<ColorKind, u16>,
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next free color of `kind` to `token`.
    pub fn register(&mut self, token: Address, kind: ColorKind) -> ExitResult<Color> {
        if self.tokens.values().any(|existing| *existing == token) {
            return Err(ExitError::TokenRegistered(token));
        }
        let index = self.counters.get(&kind).copied().unwrap_or(0);
        let color = Color::nth(kind, index).ok_or(ExitError::ColorsExhausted(kind))?;

        self.tokens.insert(color, token);
        self.counters.insert(kind, index + 1);
        info!("[pc-05] registered {} for token 0x{}", color, short_hex(&token));
        Ok(color)
    }

    pub fn token(&self, color: Color) -> Option<Address> {
        self.tokens.get(&color).copied()
    }

    pub fn is_registered(&self, color: Color) -> bool {
        self.tokens.contains_key(&color)
    }

    /// Number of colors registered for `kind`.
    pub fn count(&self, kind: ColorKind) -> u16 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Color, Address)> + '_ {
        self.tokens.iter().map(|(color, token)| (*color, *token))
    }

    /// Registered, and the asset fits the color's range.
    pub fn check(&self, color: Color, asset: &Asset) -> ExitResult<()> {
        if !self.is_registered(color) {
            return Err(ExitError::UnknownColor(color));
        }
        asset.check_color(color)?;
        Ok(())
    }
}
