//! Multicasting building blocks: the four `Subject` flavors and the
//! `connect`/`refCount`/`autoConnect` bridge from a cold `Source` to a
//! multicasting one.

mod async_subject;
mod behavior;
mod broadcaster;
mod connectable;
mod publish;
mod replay;

pub use async_subject::AsyncSubject;
pub use behavior::BehaviorSubject;
pub use connectable::{
    AutoConnectSource, ConnectableSource, MulticastTarget, RefCountSource, publish, replay, share,
};
pub use publish::PublishSubject;
pub use replay::ReplaySubject;

pub mod prelude {
    pub use crate::{
        AsyncSubject, AutoConnectSource, BehaviorSubject, ConnectableSource, MulticastTarget,
        PublishSubject, RefCountSource, ReplaySubject, publish, replay, share,
    };
}
