//! Register values
//!
//! A [`Value`] is a type-erased register slot. It is either empty or holds a
//! single payload of any `Send + 'static` type. Payloads that own resources
//! needing explicit release on failure (pending futures, buffers shared with
//! other contexts) are stored with [`Value::with_error_handler`] so the unwind
//! pass can reach them.

use crate::vm::interpreter::ContextControl;
use std::any::Any;
use std::fmt;

/// Error propagation hook for register payloads
///
/// Called once per live register while an execution context unwinds after
/// a failure. The handler sees the failing context's control block: it can
/// read the recorded error, and it can suspend the context if releasing the
/// payload must wait on asynchronous work.
pub trait HandleError: Send + 'static {
    /// React to the owning context failing
    fn handle_error(&mut self, control: &mut ContextControl);
}

trait Payload: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn handle_error(&mut self, control: &mut ContextControl);
    fn type_name(&self) -> &'static str;
}

struct Plain<T>(T);

impl<T: Any + Send> Payload for Plain<T> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.0
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        Box::new(self.0)
    }

    fn handle_error(&mut self, _control: &mut ContextControl) {}

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

struct Handled<T>(T);

impl<T: HandleError> Payload for Handled<T> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.0
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        Box::new(self.0)
    }

    fn handle_error(&mut self, control: &mut ContextControl) {
        self.0.handle_error(control);
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A register value
#[derive(Default)]
pub struct Value {
    payload: Option<Box<dyn Payload>>,
}

impl Value {
    /// Create a value holding a plain payload
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            payload: Some(Box::new(Plain(value))),
        }
    }

    /// Create a value whose payload participates in error unwinding
    pub fn with_error_handler<T: HandleError>(value: T) -> Self {
        Self {
            payload: Some(Box::new(Handled(value))),
        }
    }

    /// Create an empty value
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the register holds a payload
    #[inline]
    pub fn has_value(&self) -> bool {
        self.payload.is_some()
    }

    /// Check if the payload is of type `T`
    pub fn is<T: Any>(&self) -> bool {
        self.payload
            .as_ref()
            .is_some_and(|p| p.as_any().is::<T>())
    }

    /// Borrow the payload as `T`
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the payload as `T`
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    /// Move the payload out as `T`, leaving the register empty
    ///
    /// Returns `None` and leaves the register untouched if the payload is
    /// missing or of another type.
    pub fn take<T: Any>(&mut self) -> Option<T> {
        if !self.is::<T>() {
            return None;
        }
        let payload = self.payload.take()?;
        payload.into_any().downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// Replace the payload with a plain value
    pub fn set<T: Any + Send>(&mut self, value: T) {
        *self = Value::new(value);
    }

    /// Drop the payload
    pub fn reset(&mut self) {
        self.payload = None;
    }

    /// Run the payload's error hook, if it has one
    pub fn handle_error(&mut self, control: &mut ContextControl) {
        if let Some(payload) = self.payload.as_mut() {
            payload.handle_error(control);
        }
    }

    /// Name of the payload type
    pub fn type_name(&self) -> Option<&'static str> {
        self.payload.as_ref().map(|p| p.type_name())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => write!(f, "Value({})", name),
            None => f.write_str("Value(empty)"),
        }
    }
}
