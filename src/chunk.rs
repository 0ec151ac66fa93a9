//! Partition a sequence into fixed-size groups.

use crate::error::{require_positive, ConfigurationError};

/// Split `items` into consecutive groups of `size` elements.
///
/// The last group holds the remainder when the input length is not a
/// multiple of `size`. Empty input yields no groups. A single item is
/// passed as any one-element iterable (`[item]`, `Some(item)`).
///
/// # Errors
///
/// `SizeRequired` when `size` is `None`, `SizeNotPositive` when it is zero.
///
/// # Example
///
/// ```
/// use message_batcher::chunk;
///
/// let groups = chunk(1..=8, Some(5)).unwrap();
/// assert_eq!(groups, vec![vec![1, 2, 3, 4, 5], vec![6, 7, 8]]);
/// ```
pub fn chunk<T, I>(items: I, size: Option<usize>) -> Result<Vec<Vec<T>>, ConfigurationError>
where
    I: IntoIterator<Item = T>,
{
    let size = require_positive(size)?;

    let mut groups = Vec::new();
    let mut current = Vec::with_capacity(size);
    for item in items {
        current.push(item);
        if current.len() == size {
            groups.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    Ok(groups)
}
