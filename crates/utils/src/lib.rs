#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::dbg_macro,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use std::{collections::HashSet, hash::Hash};

pub mod error;

/// Removes repeated items from `items`, keeping the first occurrence of each one
/// and the original relative order
pub fn dedup_in_order<T>(items: impl IntoIterator<Item = T>) -> Vec<T>
where
	T: Eq + Hash + Clone,
{
	let mut seen = HashSet::new();

	items
		.into_iter()
		.filter(|item| seen.insert(item.clone()))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dedup_keeps_first_occurrence() {
		assert_eq!(dedup_in_order([3, 1, 3, 2, 1]), vec![3, 1, 2]);
		assert!(dedup_in_order(Vec::<i64>::new()).is_empty());
	}
}
