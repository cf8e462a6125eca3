use std::fmt::{Debug, Error, Formatter};
use std::iter::Enumerate;
use std::result::Result;
use std::slice::Iter;

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// In class files, this shows up for the constant pool: most entries take one slot, but `long`
/// and `double` constants take two, and the pool itself starts at offset 1.
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,
}

/// Offset into an `OffsetVec` (or into a sequence of bytes, for instruction positions)
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector, with a custom starting offset
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
        }
    }

    /// Number of entries (not the sum of their widths)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the next element to be added
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back, returning the offset at which it was placed
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));
        offset
    }

    /// Get an entry (and its index) by its offset in the vector
    ///
    /// Note: this uses binary search to find the offset
    pub fn get_offset(&self, offset: Offset) -> OffsetResult<T> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Err(insert_at) if insert_at == self.entries.len() => OffsetResult::TooLarge,
            Err(0) => OffsetResult::TooSmall,
            Err(insert_at) => OffsetResult::InvalidOffset(insert_at - 1),
            Ok(found_idx) => OffsetResult::Ok(found_idx, &self.entries[found_idx].1),
        }
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }
}

#[derive(Debug, PartialEq)]
pub enum OffsetResult<'a, T> {
    /// Element was found at this index
    Ok(usize, &'a T),

    /// Offset falls in the middle of the element at this index
    InvalidOffset(usize),

    /// Offset is before the first element
    TooSmall,

    /// Offset is past the last element
    TooLarge,
}

/// Iterator for borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Slot {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Narrow(_) => 1,
                Slot::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn offsets_account_for_width() {
        let mut slots: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(0));
        assert_eq!(slots.push(Slot::Narrow(1)), Offset(0));
        assert_eq!(slots.push(Slot::Wide(2)), Offset(1));
        assert_eq!(slots.push(Slot::Narrow(3)), Offset(3));
        assert_eq!(
            slots.iter().collect::<Vec<_>>(),
            vec![
                (Offset(0), 0, &Slot::Narrow(1)),
                (Offset(1), 1, &Slot::Wide(2)),
                (Offset(3), 2, &Slot::Narrow(3)),
            ]
        );
        assert_eq!(slots.offset_len(), Offset(4));
    }

    #[test]
    fn lookup_by_offset() {
        let mut slots: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        slots.push(Slot::Wide(1));
        slots.push(Slot::Narrow(2));

        assert_eq!(slots.get_offset(Offset(0)), OffsetResult::TooSmall);
        assert_eq!(slots.get_offset(Offset(1)), OffsetResult::Ok(0, &Slot::Wide(1)));
        assert_eq!(slots.get_offset(Offset(2)), OffsetResult::InvalidOffset(0));
        assert_eq!(slots.get_offset(Offset(3)), OffsetResult::Ok(1, &Slot::Narrow(2)));
        assert_eq!(slots.get_offset(Offset(4)), OffsetResult::TooLarge);
    }
}
