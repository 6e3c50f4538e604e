//! # Task: an immutable description of a deferred computation.
//!
//! A [`Task`] is a tree of variant nodes. Building one (with a constructor or a
//! combinator) never runs anything; [`Task::run`] creates a fresh execution
//! instance every time it is called, so one node can be run any number of
//! times, sequentially or concurrently.
//!
//! ## Variants
//! ```text
//! leaves:      FromComputation | Of | Rejected | Empty
//! unary:       Map | MapRejected
//! sequencing:  Chain | OrElse
//! fan-out:     All | Race
//! ```
//!
//! `run` dispatches on the variant. Leaves settle directly or through the
//! settlement guard; type-changing variants hold a boxed stage that knows the
//! child's concrete types.

use std::fmt;
use std::sync::Arc;

use crate::core::{Cancel, Handlers, Resolver, Teardown, guard};
use crate::tasks::fanout::{AllStage, race};
use crate::tasks::transform::{ChainStage, MapRejectedStage, MapStage, OrElseStage};

/// Bound shared by success and failure values.
///
/// Values are cloned when a node that owns them is run again (`Of`, `Rejected`)
/// and may be delivered from another thread.
pub trait Value: Clone + Send + Sync + 'static {}

impl<V: Clone + Send + Sync + 'static> Value for V {}

pub(crate) type Computation<T, E> = Arc<dyn Fn(Resolver<T, E>) -> Teardown + Send + Sync>;

/// One runnable step whose child has different value types than its output.
pub(crate) trait Stage<T, E>: Send + Sync {
    fn run(&self, handlers: Handlers<T, E>) -> Cancel;
}

pub(crate) enum Node<T, E> {
    FromComputation(Computation<T, E>),
    Of(T),
    Rejected(E),
    Empty,
    Map(Box<dyn Stage<T, E>>),
    MapRejected(Box<dyn Stage<T, E>>),
    Chain(Box<dyn Stage<T, E>>),
    OrElse(Box<dyn Stage<T, E>>),
    All(Box<dyn Stage<T, E>>),
    Race(Vec<Task<T, E>>),
}

impl<T, E> Node<T, E> {
    fn label(&self) -> &'static str {
        match self {
            Node::FromComputation(_) => "from_computation",
            Node::Of(_) => "of",
            Node::Rejected(_) => "rejected",
            Node::Empty => "empty",
            Node::Map(_) => "map",
            Node::MapRejected(_) => "map_rejected",
            Node::Chain(_) => "chain",
            Node::OrElse(_) => "or_else",
            Node::All(_) => "all",
            Node::Race(_) => "race",
        }
    }
}

/// # Lazy, cancelable unit of deferred computation.
///
/// Settles with a success value `T` or a domain failure `E`, at most once per run.
///
/// # Example
/// ```
/// use std::sync::{Arc, Mutex};
/// use settle::Task;
///
/// let task: Task<u32, String> = Task::of(20)
///     .map(|x| x + 1)
///     .chain(|x| Task::of(x * 2));
///
/// let out = Arc::new(Mutex::new(None));
/// let o = out.clone();
/// task.run(move |v: u32| *o.lock().unwrap() = Some(v));
/// assert_eq!(*out.lock().unwrap(), Some(42));
/// ```
pub struct Task<T, E> {
    node: Arc<Node<T, E>>,
}

impl<T, E> Clone for Task<T, E> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Task<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("kind", &self.node.label())
            .finish()
    }
}

impl<T: Value, E: Value> Task<T, E> {
    fn from_node(node: Node<T, E>) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    /// Returns the variant name of the root node (`"map"`, `"race"`, …).
    pub fn kind(&self) -> &'static str {
        self.node.label()
    }

    // ---- Construction ----

    /// Wraps an external computation.
    ///
    /// The computation receives a [`Resolver`] and returns what to do on
    /// cancellation/close: a [`Teardown`], a child [`Cancel`], or `()`. It is
    /// invoked once per run and may settle synchronously or later from any thread.
    pub fn create<F, R>(computation: F) -> Self
    where
        F: Fn(Resolver<T, E>) -> R + Send + Sync + 'static,
        R: Into<Teardown>,
    {
        Self::from_node(Node::FromComputation(Arc::new(move |resolver| {
            computation(resolver).into()
        })))
    }

    /// A task that succeeds immediately with `value`.
    pub fn of(value: T) -> Self {
        Self::from_node(Node::Of(value))
    }

    /// A task that fails immediately with `error`.
    pub fn rejected(error: E) -> Self {
        Self::from_node(Node::Rejected(error))
    }

    /// A task that never settles. Canceling it is a no-op.
    pub fn empty() -> Self {
        Self::from_node(Node::Empty)
    }

    /// Joins tasks: succeeds with every value in input order, or fails with the first failure.
    ///
    /// All tasks are started at once. The first failure cancels the others. An
    /// empty input succeeds with an empty `Vec`.
    pub fn all(tasks: impl IntoIterator<Item = Task<T, E>>) -> Task<Vec<T>, E> {
        Task::from_node(Node::All(Box::new(AllStage::new(tasks.into_iter().collect()))))
    }

    /// Selects the first task to settle, success or failure, and cancels the rest.
    ///
    /// An empty input never settles.
    pub fn race(tasks: impl IntoIterator<Item = Task<T, E>>) -> Self {
        Self::from_node(Node::Race(tasks.into_iter().collect()))
    }

    // ---- Transforms ----

    /// Transforms the success value.
    ///
    /// A panic in `f` is not captured here; it unwinds through whatever frame
    /// delivered the child's success.
    pub fn map<U, F>(&self, f: F) -> Task<U, E>
    where
        U: Value,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Task::from_node(Node::Map(Box::new(MapStage::new(self.clone(), f))))
    }

    /// Transforms the failure value.
    pub fn map_rejected<E2, F>(&self, f: F) -> Task<T, E2>
    where
        E2: Value,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        Task::from_node(Node::MapRejected(Box::new(MapRejectedStage::new(
            self.clone(),
            f,
        ))))
    }

    /// Transforms both channels.
    pub fn bimap<U, E2, F, G>(&self, on_success: F, on_failure: G) -> Task<U, E2>
    where
        U: Value,
        E2: Value,
        F: Fn(T) -> U + Send + Sync + 'static,
        G: Fn(E) -> E2 + Send + Sync + 'static,
    {
        self.map(on_success).map_rejected(on_failure)
    }

    /// Sequences a second task produced from this task's success value.
    ///
    /// A panic in `f` is delivered on the defect channel. Canceling the result
    /// cancels whichever of the two tasks is in flight.
    pub fn chain<U, F>(&self, f: F) -> Task<U, E>
    where
        U: Value,
        F: Fn(T) -> Task<U, E> + Send + Sync + 'static,
    {
        Task::from_node(Node::Chain(Box::new(ChainStage::new(self.clone(), f))))
    }

    /// Recovers from a failure with a second task produced from the failure value.
    pub fn or_else<E2, F>(&self, f: F) -> Task<T, E2>
    where
        E2: Value,
        F: Fn(E) -> Task<T, E2> + Send + Sync + 'static,
    {
        Task::from_node(Node::OrElse(Box::new(OrElseStage::new(self.clone(), f))))
    }

    /// Races this task against `other`; the earlier settlement wins.
    pub fn concat(&self, other: &Task<T, E>) -> Self {
        Task::race([self.clone(), other.clone()])
    }

    // ---- Execution ----

    /// Runs the task with a fresh execution instance and returns its cancel handle.
    ///
    /// Accepts a full [`Handlers`] set or a bare success closure (failures and
    /// defects then follow the default [`Config`](crate::Config): raise).
    pub fn run(&self, handlers: impl Into<Handlers<T, E>>) -> Cancel {
        let handlers = handlers.into();
        match &*self.node {
            Node::FromComputation(computation) => {
                let computation = computation.clone();
                guard(move |resolver| computation(resolver), handlers)
            }
            Node::Of(value) => {
                handlers.succeed(value.clone());
                Cancel::noop()
            }
            Node::Rejected(error) => {
                handlers.fail(error.clone());
                Cancel::noop()
            }
            Node::Empty => {
                drop(handlers);
                Cancel::noop()
            }
            Node::Map(stage)
            | Node::MapRejected(stage)
            | Node::Chain(stage)
            | Node::OrElse(stage)
            | Node::All(stage) => stage.run(handlers),
            Node::Race(tasks) => race(tasks, handlers),
        }
    }
}

/// Operand slot used by [`Task::ap`] to join a function and its argument.
#[derive(Clone)]
enum Operand<F, A> {
    Func(F),
    Arg(A),
}

impl<F: Value, E: Value> Task<F, E> {
    /// Applies the function this task produces to the value `other` produces.
    ///
    /// Both run concurrently; a failure of either fails the result.
    pub fn ap<A, B>(&self, other: &Task<A, E>) -> Task<B, E>
    where
        A: Value,
        B: Value,
        F: Fn(A) -> B,
    {
        // `all` succeeds only once every slot is filled, one value per input in
        // input order, so the joined vector is always `[Func, Arg]`.
        Task::all([self.map(Operand::Func), other.map(Operand::Arg)]).map(
            |operands: Vec<Operand<F, A>>| {
                let Ok([Operand::Func(f), Operand::Arg(a)]) = <[_; 2]>::try_from(operands) else {
                    unreachable!("all yields one value per input, in input order")
                };
                f(a)
            },
        )
    }
}

impl<T: Value, E: Value> Task<Task<T, E>, E> {
    /// Runs the task this task produces.
    pub fn flatten(&self) -> Task<T, E> {
        self.chain(|inner| inner)
    }
}
