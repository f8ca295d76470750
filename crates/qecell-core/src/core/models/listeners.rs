use super::ids::ListenerId;
use slotmap::SlotMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Registry of change listeners for one model.
///
/// Notification iterates over a snapshot of the registered listeners taken before
/// the first call, so a listener may freely read the model, write to it again, or
/// (un)register listeners while it runs.
pub struct Listeners<E> {
    slots: RefCell<SlotMap<ListenerId, Listener<E>>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(SlotMap::with_key()),
        }
    }

    pub fn add(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        self.slots.borrow_mut().insert(Rc::new(listener))
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.slots.borrow_mut().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self.slots.borrow().values().cloned().collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

/// A model that publishes change events.
pub trait Observable {
    type Event;

    fn listeners(&self) -> &Listeners<Self::Event>;

    fn subscribe(&self, listener: impl Fn(&Self::Event) + 'static) -> ListenerId
    where
        Self: Sized,
    {
        self.listeners().add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners().remove(id)
    }
}

/// Detaches a listener from its model when dropped.
///
/// The subscription only holds a weak reference to the model, so it never keeps a
/// model alive; dropping it after the model is gone is a no-op.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Registers `listener` on `model` and ties its lifetime to the returned value.
    pub fn attach<M>(model: &Rc<M>, listener: impl Fn(&M::Event) + 'static) -> Self
    where
        M: Observable + 'static,
    {
        let id = model.listeners().add(listener);
        let model = Rc::downgrade(model);
        Self {
            detach: Some(Box::new(move || {
                if let Some(model) = model.upgrade() {
                    model.listeners().remove(id);
                }
            })),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}
