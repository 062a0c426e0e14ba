//! Combinator methods for building transform stages.

use crate::core::Publisher;
use crate::processors::Transform;

/// Extension trait for publishers that provides combinator methods.
///
/// Every combinator produces a [`Transform`], so stages compose: a transform
/// is itself a publisher.
pub trait PublisherExt: Publisher + Sized {
    /// Map each item into zero or more outputs
    fn transform<U, F>(self, mapping: F) -> Transform<Self, U>
    where
        F: Fn(Self::Item) -> Vec<U> + 'static,
        U: 'static,
    {
        Transform::new(self, mapping)
    }

    /// Map items through a function
    fn map<U, F>(self, f: F) -> Transform<Self, U>
    where
        F: Fn(Self::Item) -> U + 'static,
        U: 'static,
    {
        Transform::new(self, move |item| vec![f(item)])
    }

    /// Filter items based on a predicate
    fn filter<F>(self, predicate: F) -> Transform<Self, Self::Item>
    where
        F: Fn(&Self::Item) -> bool + 'static,
    {
        Transform::new(self, move |item| {
            if predicate(&item) {
                vec![item]
            } else {
                vec![]
            }
        })
    }

    /// Map each item into any iterable of outputs
    fn flat_map<I, F>(self, f: F) -> Transform<Self, I::Item>
    where
        F: Fn(Self::Item) -> I + 'static,
        I: IntoIterator,
        I::Item: 'static,
    {
        Transform::new(self, move |item| f(item).into_iter().collect())
    }

    /// Emit every item `count` times
    fn duplicate(self, count: usize) -> Transform<Self, Self::Item>
    where
        Self::Item: Clone,
    {
        Transform::new(self, move |item| vec![item; count])
    }
}

impl<P: Publisher> PublisherExt for P {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Demand;
    use crate::sinks::CollectSink;
    use crate::sources::BufferedSource;

    #[test]
    fn test_map_combinator() {
        let sink = CollectSink::new();
        BufferedSource::new(vec![1, 2, 3, 4, 5])
            .map(|x| x * 2)
            .subscribe(sink.clone());

        assert_eq!(sink.items(), vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_filter_combinator() {
        let sink = CollectSink::new();
        BufferedSource::new((1..11).collect::<Vec<i32>>())
            .filter(|x| x % 2 == 0)
            .subscribe(sink.clone());

        assert_eq!(sink.items(), vec![2, 4, 6, 8, 10]);
        assert!(sink.completion().unwrap().is_finished());
    }

    #[test]
    fn test_flat_map_combinator() {
        let sink = CollectSink::new();
        BufferedSource::new(vec!["ab", "", "c"])
            .flat_map(|s: &str| s.chars().collect::<Vec<_>>())
            .subscribe(sink.clone());

        assert_eq!(sink.items(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_duplicate_combinator() {
        let sink = CollectSink::new();
        BufferedSource::from("ab").duplicate(3).subscribe(sink.clone());

        assert_eq!(sink.items(), vec!['a', 'a', 'a', 'b', 'b', 'b']);
    }

    #[test]
    fn test_complex_combination() {
        let sink = CollectSink::with_demand(Demand::max(2));
        BufferedSource::new((1..21).collect::<Vec<i32>>())
            .filter(|x| x % 2 == 0)
            .map(|x| x * 3)
            .duplicate(2)
            .subscribe(sink.clone());

        assert_eq!(sink.items(), vec![6, 6]);
        assert!(sink.completion().is_none());

        sink.subscription().unwrap().request(Demand::unlimited());
        assert_eq!(sink.items().len(), 20);
        assert_eq!(&sink.items()[..6], &[6, 6, 12, 12, 18, 18]);
        assert!(sink.completion().unwrap().is_finished());
    }
}
