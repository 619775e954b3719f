//! `groupBy(key_selector)`: splits a stream into per-key sub-streams.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use reactor_core::{BoxObserver, Disposable, Observer, ReactorError, Source, guard_call};
use reactor_subjects::PublishSubject;

/// A single key's sub-stream, handed to the `groupBy` downstream the first
/// time an item with that key arrives. Subscribing late (after the parent
/// has already emitted values for this key) behaves like subscribing late to
/// any [`PublishSubject`]: only subsequent items are seen.
pub struct GroupedSource<K, T, E> {
    key: K,
    subject: PublishSubject<T, E>,
}

impl<K: Clone, T, E> GroupedSource<K, T, E> {
    pub fn key(&self) -> K {
        self.key.clone()
    }
}

impl<K, T, E> Source<T, E> for GroupedSource<K, T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        self.subject.subscribe(observer);
    }
}

pub struct GroupBy<T, K, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    key_selector: Arc<F>,
}

impl<T, K, E, F> GroupBy<T, K, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, key_selector: F) -> Self {
        Self { upstream, key_selector: Arc::new(key_selector) }
    }
}

impl<T, K, E, F> Source<Arc<GroupedSource<K, T, E>>, E> for GroupBy<T, K, E, F>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static + From<ReactorError>,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<Arc<GroupedSource<K, T, E>>, E>) {
        self.upstream.subscribe(Box::new(GroupByObserver {
            downstream: observer,
            key_selector: self.key_selector.clone(),
            groups: Mutex::new(HashMap::new()),
        }));
    }
}

struct GroupByObserver<T, K, E, F> {
    downstream: BoxObserver<Arc<GroupedSource<K, T, E>>, E>,
    key_selector: Arc<F>,
    groups: Mutex<HashMap<K, PublishSubject<T, E>>>,
}

impl<T, K, E, F> Observer<T, E> for GroupByObserver<T, K, E, F>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static + From<ReactorError>,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }

    fn on_next(&self, value: T) {
        let key_selector = &self.key_selector;
        let key = match guard_call("groupBy.key_selector_panicked", || key_selector(&value)) {
            Ok(key) => key,
            Err(e) => {
                self.on_error(e.into());
                return;
            }
        };
        let (subject, is_new) = {
            let mut groups = self.groups.lock();
            match groups.get(&key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let subject = PublishSubject::new();
                    groups.insert(key.clone(), subject.clone());
                    (subject, true)
                }
            }
        };
        if is_new {
            self.downstream.on_next(Arc::new(GroupedSource { key, subject: subject.clone() }));
        }
        subject.on_next(value);
    }

    fn on_error(&self, error: E) {
        let groups = std::mem::take(&mut *self.groups.lock());
        for (_, subject) in groups {
            subject.on_error(error.clone());
        }
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        let groups = std::mem::take(&mut *self.groups.lock());
        for (_, subject) in groups {
            subject.on_complete();
        }
        self.downstream.on_complete();
    }
}

pub fn group_by<T, K, E, F>(upstream: Arc<dyn Source<T, E>>, key_selector: F) -> GroupBy<T, K, E, F>
where
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    GroupBy::new(upstream, key_selector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::just;

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);
    impl From<ReactorError> for TestError {
        fn from(e: ReactorError) -> Self {
            TestError(e.to_string())
        }
    }

    struct GroupRecorder {
        log: Arc<Mutex<Vec<String>>>,
    }
    impl Observer<Arc<GroupedSource<bool, i32, TestError>>, TestError> for GroupRecorder {
        fn on_subscribe(&self, _d: Disposable) {}
        fn on_next(&self, group: Arc<GroupedSource<bool, i32, TestError>>) {
            let log = self.log.clone();
            let key = group.key();
            group.subscribe(Box::new(ValueRecorder { log, key }));
        }
        fn on_error(&self, error: TestError) {
            self.log.lock().push(format!("outer-error:{error}"));
        }
        fn on_complete(&self) {
            self.log.lock().push("outer-complete".into());
        }
    }
    struct ValueRecorder {
        log: Arc<Mutex<Vec<String>>>,
        key: bool,
    }
    impl Observer<i32, TestError> for ValueRecorder {
        fn on_subscribe(&self, _d: Disposable) {}
        fn on_next(&self, value: i32) {
            self.log.lock().push(format!("group:{}:{value}", self.key));
        }
        fn on_error(&self, error: TestError) {
            self.log.lock().push(format!("group:{}:error:{error}", self.key));
        }
        fn on_complete(&self) {
            self.log.lock().push(format!("group:{}:complete", self.key));
        }
    }

    #[test]
    fn group_by_routes_values_to_the_right_group_and_completes_each() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(just(vec![1, 2, 3, 4]));
        let op = group_by(upstream, |v: &i32| v % 2 == 0);
        Source::<Arc<GroupedSource<bool, i32, TestError>>, TestError>::subscribe(
            &op,
            Box::new(GroupRecorder { log: log.clone() }),
        );
        let entries = log.lock();
        assert!(entries.contains(&"group:false:1".to_string()));
        assert!(entries.contains(&"group:true:2".to_string()));
        assert!(entries.contains(&"group:false:complete".to_string()));
        assert!(entries.contains(&"group:true:complete".to_string()));
        assert_eq!(*entries.last().unwrap(), "outer-complete");
    }
}
