use std::sync::Arc;
use xlquery::{
    Fragment,
    FragmentKind,
};

/// Everything matched for one base fragment at one charge.
///
/// Peaks are referenced by their index in the owning spectrum.
#[derive(Debug, Clone)]
pub struct MatchedBaseFragment {
    pub base: Arc<Fragment>,
    pub charge: u8,
    pub base_peaks: Vec<usize>,
    pub losses: Vec<(Arc<Fragment>, usize)>,
}

impl MatchedBaseFragment {
    pub fn is_base_found(&self) -> bool {
        !self.base_peaks.is_empty()
    }

    /// Every (fragment, peak) pair recorded in this entry, base first.
    pub fn annotations(&self) -> impl Iterator<Item = (&Arc<Fragment>, usize)> {
        self.base_peaks
            .iter()
            .map(|p| (&self.base, *p))
            .chain(self.losses.iter().map(|(f, p)| (f, *p)))
    }

    pub fn annotation_count(&self) -> usize {
        self.base_peaks.len() + self.losses.len()
    }

    fn is_empty(&self) -> bool {
        self.annotation_count() == 0
    }
}

fn root_of(fragment: &Arc<Fragment>) -> &Arc<Fragment> {
    match &fragment.kind {
        FragmentKind::Loss { base, .. } => root_of(base),
        _ => fragment,
    }
}

/// Matched fragments of a spectrum match, grouped by base fragment and charge.
#[derive(Debug, Clone, Default)]
pub struct MatchedFragmentCollection {
    entries: Vec<MatchedBaseFragment>,
}

impl MatchedFragmentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, base: &Fragment, charge: u8) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.charge == charge && e.base.as_ref() == base)
    }

    /// Records `fragment` at `charge` as explaining the peak at `peak`.
    pub fn add(&mut self, fragment: &Arc<Fragment>, charge: u8, peak: usize) {
        let base = root_of(fragment);
        let idx = match self.position(base, charge) {
            Some(i) => i,
            None => {
                self.entries.push(MatchedBaseFragment {
                    base: base.clone(),
                    charge,
                    base_peaks: Vec::new(),
                    losses: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[idx];
        if fragment.is_loss() {
            if !entry
                .losses
                .iter()
                .any(|(f, p)| *p == peak && f.as_ref() == fragment.as_ref())
            {
                entry.losses.push((fragment.clone(), peak));
            }
        } else if !entry.base_peaks.contains(&peak) {
            entry.base_peaks.push(peak);
        }
    }

    /// Forgets every match of `fragment` at `charge`.
    ///
    /// Returns the peaks the fragment was matched to. Entries left without
    /// any match are dropped.
    pub fn remove(&mut self, fragment: &Fragment, charge: u8) -> Vec<usize> {
        let Some(idx) = self.position(fragment.base(), charge) else {
            return Vec::new();
        };
        let entry = &mut self.entries[idx];
        let removed = if fragment.is_loss() {
            let mut removed = Vec::new();
            entry.losses.retain(|(f, p)| {
                if f.as_ref() == fragment {
                    removed.push(*p);
                    false
                } else {
                    true
                }
            });
            removed
        } else {
            std::mem::take(&mut entry.base_peaks)
        };
        if entry.is_empty() {
            self.entries.remove(idx);
        }
        removed
    }

    pub fn remove_entry(&mut self, index: usize) -> MatchedBaseFragment {
        self.entries.remove(index)
    }

    /// Removes and returns the entries for which `pred` holds.
    pub fn drain_where(
        &mut self,
        mut pred: impl FnMut(&MatchedBaseFragment) -> bool,
    ) -> Vec<MatchedBaseFragment> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if pred(&self.entries[i]) {
                taken.push(self.remove_entry(i));
            } else {
                i += 1;
            }
        }
        taken
    }

    pub fn find(&self, fragment: &Fragment, charge: u8) -> Option<&MatchedBaseFragment> {
        self.position(fragment.base(), charge)
            .map(|i| &self.entries[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchedBaseFragment> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (fragment, charge, peak) matches held.
    pub fn annotation_count(&self) -> usize {
        self.entries.iter().map(|e| e.annotation_count()).sum()
    }
}

impl<'a> IntoIterator for &'a MatchedFragmentCollection {
    type Item = &'a MatchedBaseFragment;
    type IntoIter = std::slice::Iter<'a, MatchedBaseFragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
