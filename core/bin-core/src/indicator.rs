//! Session indicator output (the bin's status LED).

pub trait SessionIndicator {
    fn show(&mut self, active: bool);
}

/// Logs indicator changes instead of driving a pin.
#[derive(Debug, Default)]
pub struct LogIndicator {
    lit: Option<bool>,
}

impl LogIndicator {
    pub fn is_lit(&self) -> bool {
        self.lit.unwrap_or(false)
    }
}

impl SessionIndicator for LogIndicator {
    fn show(&mut self, active: bool) {
        if self.lit == Some(active) {
            return;
        }
        self.lit = Some(active);
        tracing::info!(lit = active, "Session indicator");
    }
}
