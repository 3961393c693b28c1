/// A hook that sees every event a solver emits.
///
/// Solvers call [`observe`](Observer::observe) once per event, in order,
/// and keep going when it returns `None`. Returning `Some(action)` asks the
/// solver to act, with `A` defined by the solver; stopping early with the
/// best point found so far is the usual case.
///
/// Any `FnMut(&E) -> Option<A>` closure is an observer, so progress logging
/// or a stopping rule can be written inline. Pass `()` to observe nothing.
pub trait Observer<E, A> {
    /// Inspects `event` and optionally requests an action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

/// Ignores every event.
impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Halt {
        Now,
    }

    fn drive<Obs: Observer<u32, Halt>>(mut observer: Obs, events: &[u32]) -> Option<usize> {
        events
            .iter()
            .position(|event| observer.observe(event).is_some())
    }

    #[test]
    fn unit_observer_never_acts() {
        assert_eq!(drive((), &[1, 2, 3]), None);
    }

    #[test]
    fn closure_observer_can_stop() {
        let observer = |event: &u32| (*event >= 2).then_some(Halt::Now);
        assert_eq!(drive(observer, &[1, 2, 3]), Some(1));
    }

    #[test]
    fn closure_observer_keeps_state() {
        let mut seen = Vec::new();
        let observer = |event: &u32| {
            seen.push(*event);
            None::<Halt>
        };
        assert_eq!(drive(observer, &[4, 5]), None);
        assert_eq!(seen, vec![4, 5]);
    }
}
