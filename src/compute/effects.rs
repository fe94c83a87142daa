//! Side effects recorded by the traced phase and replayed on the host.

/// A deferred host action for one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The lane reached a terminal success.
    Succeed { lane: usize },
    /// The lane failed at program step `depth`; build its failure and unwind.
    Unwind { lane: usize, depth: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectQueue {
    effects: Vec<Effect>,
}

impl EffectQueue {
    pub fn new() -> Self { Self::default() }

    #[inline(always)]
    pub fn push(&mut self, effect: Effect) { self.effects.push(effect); }

    pub fn len(&self) -> usize { self.effects.len() }
    pub fn is_empty(&self) -> bool { self.effects.is_empty() }
    pub fn iter(&self) -> std::slice::Iter<'_, Effect> { self.effects.iter() }
}

impl IntoIterator for EffectQueue {
    type Item = Effect;
    type IntoIter = std::vec::IntoIter<Effect>;
    fn into_iter(self) -> Self::IntoIter { self.effects.into_iter() }
}
