use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw value used for an unanswered slot when answers leave the process
/// (persistence rows, feedback requests).
pub const UNANSWERED: i32 = -1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("invalid raw answer value {value} at slot {index}")]
    InvalidRaw { index: usize, value: i32 },
}

/// Selected option per question, one slot per question, fixed length.
///
/// Slots start unanswered and are only written by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    slots: Vec<Option<usize>>,
}

impl AnswerSet {
    #[must_use]
    pub fn unanswered(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Rebuild from the raw `-1`-sentinel representation.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::InvalidRaw` for negative values other than the sentinel.
    pub fn from_raw(raw: &[i32]) -> Result<Self, AnswerError> {
        let slots = raw
            .iter()
            .enumerate()
            .map(|(index, &value)| match value {
                UNANSWERED => Ok(None),
                v => usize::try_from(v)
                    .map(Some)
                    .map_err(|_| AnswerError::InvalidRaw { index, value }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slots })
    }

    #[must_use]
    pub fn to_raw(&self) -> Vec<i32> {
        self.slots
            .iter()
            .map(|slot| slot.map_or(UNANSWERED, |v| i32::try_from(v).unwrap_or(i32::MAX)))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<usize> {
        self.slots.get(index).copied().flatten()
    }

    #[must_use]
    pub fn is_answered(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Indices of slots that are still unanswered.
    #[must_use]
    pub fn unanswered_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.is_none().then_some(i))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.slots.iter().copied()
    }

    /// Returns false when `index` is out of range; bounds against the
    /// question's options are the caller's concern.
    pub(crate) fn set(&mut self, index: usize, option: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(option);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unanswered() {
        let answers = AnswerSet::unanswered(3);
        assert_eq!(answers.len(), 3);
        assert_eq!(answers.answered_count(), 0);
        assert!(!answers.is_complete());
        assert_eq!(answers.to_raw(), vec![-1, -1, -1]);
    }

    #[test]
    fn raw_sentinel_maps_to_none() {
        let answers = AnswerSet::from_raw(&[2, -1, 0]).unwrap();
        assert_eq!(answers.get(0), Some(2));
        assert_eq!(answers.get(1), None);
        assert_eq!(answers.unanswered_indices(), vec![1]);
        assert_eq!(answers.to_raw(), vec![2, -1, 0]);
    }

    #[test]
    fn rejects_other_negative_raw_values() {
        let err = AnswerSet::from_raw(&[0, -3]).unwrap_err();
        assert_eq!(err, AnswerError::InvalidRaw { index: 1, value: -3 });
    }

    #[test]
    fn set_overwrites_and_respects_length() {
        let mut answers = AnswerSet::unanswered(2);
        assert!(answers.set(0, 1));
        assert!(answers.set(0, 3));
        assert_eq!(answers.get(0), Some(3));
        assert!(!answers.set(2, 0));
        assert_eq!(answers.len(), 2);
    }
}
