use crate::shape::DecodedPayload;

/// Type-erased callback storage.
///
/// The concrete payload type is fixed when the callback is registered; at
/// dispatch time `invoke` restores it and reports `false` when the decoded
/// payload does not match, so the backend can warn instead of panicking.
/// `invoke_null` serves envelopes carrying the null-object sentinel, where
/// no payload type travels on the wire at all.
pub(crate) trait ErasedHandler: Send + Sync {
    fn invoke(&self, payload: DecodedPayload) -> bool;

    fn invoke_null(&self) -> bool {
        false
    }
}

pub(crate) struct EmptyHandler(pub Box<dyn Fn() + Send + Sync>);

impl ErasedHandler for EmptyHandler {
    fn invoke(&self, payload: DecodedPayload) -> bool {
        if matches!(payload, DecodedPayload::Empty) {
            (self.0)();
            true
        } else {
            false
        }
    }
}

pub(crate) struct StringHandler(pub Box<dyn Fn(Option<String>) + Send + Sync>);

impl ErasedHandler for StringHandler {
    fn invoke(&self, payload: DecodedPayload) -> bool {
        if let DecodedPayload::Str(value) = payload {
            (self.0)(value);
            true
        } else {
            false
        }
    }
}

pub(crate) struct StringListHandler(pub Box<dyn Fn(Option<Vec<Option<String>>>) + Send + Sync>);

impl ErasedHandler for StringListHandler {
    fn invoke(&self, payload: DecodedPayload) -> bool {
        if let DecodedPayload::StrList(items) = payload {
            (self.0)(items);
            true
        } else {
            false
        }
    }
}

/// Handler for any boxed payload: values, value collections and object
/// collections, where `T` is the full decoded type.
pub(crate) struct TypedHandler<T: Send + 'static> {
    pub callback: Box<dyn Fn(T) + Send + Sync>,
}

impl<T: Send + 'static> ErasedHandler for TypedHandler<T> {
    fn invoke(&self, payload: DecodedPayload) -> bool {
        let DecodedPayload::Boxed(any) = payload else {
            return false;
        };
        match any.downcast::<T>() {
            Ok(value) => {
                (self.callback)(*value);
                true
            }
            Err(_) => false,
        }
    }
}

/// Handler for structured objects; the only kind that can be invoked with a
/// null payload.
pub(crate) struct ObjectHandler<T: Send + 'static> {
    pub callback: Box<dyn Fn(Option<T>) + Send + Sync>,
}

impl<T: Send + 'static> ErasedHandler for ObjectHandler<T> {
    fn invoke(&self, payload: DecodedPayload) -> bool {
        let DecodedPayload::Boxed(any) = payload else {
            return false;
        };
        match any.downcast::<Option<T>>() {
            Ok(value) => {
                (self.callback)(*value);
                true
            }
            Err(_) => false,
        }
    }

    fn invoke_null(&self) -> bool {
        (self.callback)(None);
        true
    }
}
