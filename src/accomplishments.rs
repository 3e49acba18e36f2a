use crate::error::ValidationError;
use crate::models::Accomplishment;

/// Minimum number of accomplishments before a self-rating submission is
/// accepted. Enforced at removal and submission time, not while editing.
pub const MIN_ACCOMPLISHMENTS: usize = 2;

/// Ordered list of free-form achievement records. `item_order` is kept as a
/// dense 1..N sequence across every mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccomplishmentSet {
    review_id: i64,
    records: Vec<Accomplishment>,
}

impl AccomplishmentSet {
    pub fn new(review_id: i64) -> Self {
        AccomplishmentSet {
            review_id,
            records: Vec::new(),
        }
    }

    /// Wrap records loaded from a review, re-sorted and renumbered so that a
    /// sparse or shuffled upstream order comes out dense.
    pub fn from_records(review_id: i64, mut records: Vec<Accomplishment>) -> Self {
        records.sort_by_key(|r| r.item_order);
        let mut set = AccomplishmentSet { review_id, records };
        set.renumber();
        set
    }

    /// Append a blank record at the end of the sequence.
    pub fn add(&mut self) -> &mut Accomplishment {
        let order = self.records.len() as i32 + 1;
        self.records.push(Accomplishment {
            review_id: self.review_id,
            item_order: order,
            ..Accomplishment::default()
        });
        self.records
            .last_mut()
            .expect("record was just pushed")
    }

    /// Remove the record at `index` and renumber the remainder. Refused when
    /// the result would drop below the minimum; the list is left unchanged.
    pub fn remove(&mut self, index: usize) -> Result<(), ValidationError> {
        if index >= self.records.len() {
            return Ok(());
        }
        if self.records.len() <= MIN_ACCOMPLISHMENTS {
            return Err(ValidationError::AccomplishmentMinimum {
                required: MIN_ACCOMPLISHMENTS,
                found: self.records.len().saturating_sub(1),
            });
        }
        self.records.remove(index);
        self.renumber();
        Ok(())
    }

    fn renumber(&mut self) {
        for (idx, record) in self.records.iter_mut().enumerate() {
            record.item_order = idx as i32 + 1;
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Accomplishment> {
        self.records.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[Accomplishment] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Accomplishment> {
        self.records
    }
}
