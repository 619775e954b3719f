//! Creation primitives, stateless/stateful operators, time operators, and
//! the fluent [`Stream`] builder that composes them.
//!
//! Every free function here (`map`, `merge`, `debounce`, ...) returns a
//! concrete, directly-usable [`reactor_core::Source`] implementation; `Stream`
//! is a convenience wrapper around `Arc<dyn Source<T, E>>` that chains them
//! without naming each operator struct at the call site.

mod aggregate;
mod blocking;
mod combine;
mod creation;
mod error_redirect;
mod flat;
mod group;
mod retry;
mod scheduling;
mod stateless;
mod stream;
mod support;
mod time;
mod windowing;

pub use aggregate::{Collect, collect, to_list, to_map, to_set};
pub use blocking::{BlockingIter, blocking_first, blocking_iterable, blocking_last};
pub use combine::{
    CombineLatest, Concat, Merge, SequenceEqual, StartWith, WithLatestFrom, Zip, combine_latest,
    concat, merge, sequence_equal, start_with, with_latest_from, zip,
};
pub use creation::{
    Create, Defer, Emitter, Empty, ErrorSource, FromSequence, Interval, Just, Never, Range, Timer,
    create, defer, empty, error, from_iter, from_sequence, interval, just, never, range, timer,
};
pub use error_redirect::{OnErrorResumeNext, OnErrorReturn, on_error_resume_next, on_error_return};
pub use flat::{FlatMap, SwitchMap, concat_map, flat_map, switch_map};
pub use group::{GroupBy, GroupedSource, group_by};
pub use retry::{Retry, RetryWhen, retry, retry_when};
pub use scheduling::{ObserveOn, SubscribeOn, observe_on, subscribe_on};
pub use stateless::{
    All, Any, Count, DefaultIfEmpty, DistinctUntilChanged, DoOn, Filter, Map, Skip, Tap, Take,
    all, any, contains, count, default_if_empty, distinct_until_changed, do_on, filter, is_empty,
    map, skip, take,
};
pub use stream::{ConnectableStream, Stream, behavior_subject};
pub use time::{
    Debounce, Delay, DelaySubscription, Sample, ThrottleFirst, Timeout, debounce, delay,
    delay_subscription, sample, throttle_first, timeout,
};
pub use windowing::{
    Buffer, BufferTime, Reduce, Scan, Window, WindowTime, buffer, buffer_time, reduce, scan,
    window, window_time,
};

pub mod prelude {
    pub use crate::{
        Stream, ConnectableStream, Tap,
        behavior_subject, buffer, buffer_time, collect, combine_latest, concat, concat_map,
        contains, create, debounce, default_if_empty, defer, delay, delay_subscription,
        distinct_until_changed, do_on, empty, error, filter, flat_map, from_iter, from_sequence,
        group_by, interval, is_empty, just, map, merge, never, observe_on, on_error_resume_next,
        on_error_return, range, reduce, retry, retry_when, sample, scan, sequence_equal, skip,
        start_with, subscribe_on, switch_map, take, throttle_first, timeout, timer, to_list,
        to_map, to_set, window, window_time, with_latest_from, zip,
    };
}
