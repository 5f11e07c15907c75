//! Default display names for patterns and responses registered without one.

/// Monotonic `"<prefix> #<n>"` generator, starting at 1. Each registry owns
/// its own generators, so independently built registries never interfere.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    prefix: &'static str,
    counter: u64,
}

impl NameGenerator {
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix, counter: 0 }
    }

    pub fn next_name(&mut self) -> String {
        self.counter += 1;
        format!("{} #{}", self.prefix, self.counter)
    }
}
