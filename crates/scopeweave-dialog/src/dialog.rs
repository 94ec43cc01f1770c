//! A timed dialog: a window scope, its choices and a transcript.

use std::cell::RefCell;
use std::rc::Rc;

use scopeweave_core::{
    Clock, Events, Observed, Pending, Scheduler, Scope, Scoped, SettableScope, Subscription,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::choice::{Choice, Picked};
use crate::error::DialogError;
use crate::transcript::{EntryKind, Transcript};

/// Prompt shown while the window is open.
pub const PROMPT_OPEN: &str = "open";
/// Prompt shown once the window has closed.
pub const PROMPT_CLOSED: &str = "closed";

/// A dialog whose choices are available while its window is open.
///
/// The window starts open. Something outside the dialog, usually a timer,
/// calls [`close_window`](Self::close_window). Picks are scheduled; call
/// [`run_turns`](Self::run_turns) to let them run.
#[derive(Debug)]
pub struct Dialog {
    id: Uuid,
    scheduler: Scheduler,
    window: SettableScope,
    choices: Vec<Choice>,
    picks: Events<Picked>,
    prompt: Scoped<String>,
    transcript: Transcript,
    outstanding: RefCell<Vec<(String, Pending<Picked>)>>,
    _subscriptions: Vec<Subscription>,
}

impl Dialog {
    /// Opens a dialog offering `labels`, each pickable `max_asks` times.
    ///
    /// # Errors
    ///
    /// Returns `DialogError::Reactive` if the transcript listeners cannot be
    /// registered.
    pub fn open<I, S>(
        scheduler: &Scheduler,
        clock: Rc<dyn Clock>,
        max_asks: u32,
        labels: I,
    ) -> Result<Self, DialogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = Uuid::new_v4();
        let transcript = Transcript::new(id, clock);
        let window = SettableScope::new(scheduler, true);
        let picks: Events<Picked> = Events::named(scheduler, "dialog.picks");

        let choices: Vec<Choice> = labels
            .into_iter()
            .map(|label| Choice::new(label, &window.shared(), max_asks, &picks))
            .collect();

        let prompt = Scoped::new(scheduler, String::new());
        prompt.within_mapped(
            &window.shared(),
            |_| PROMPT_OPEN.to_owned(),
            |_| PROMPT_CLOSED.to_owned(),
        );

        let subscriptions = vec![
            window.on_enter().listen({
                let transcript = transcript.clone();
                move |_: &()| transcript.record(EntryKind::WindowOpened)
            })?,
            window.on_exit().listen({
                let transcript = transcript.clone();
                move |_: &()| transcript.record(EntryKind::WindowClosed)
            })?,
            picks.stream().listen({
                let transcript = transcript.clone();
                move |picked: &Picked| {
                    transcript.record(EntryKind::ChoicePicked {
                        choice_id: picked.choice_id,
                        label: picked.label.clone(),
                        remaining: picked.remaining,
                    });
                }
            })?,
        ];

        transcript.record(EntryKind::WindowOpened);
        info!(dialog_id = %id, choices = choices.len(), max_asks, "dialog opened");

        Ok(Self {
            id,
            scheduler: scheduler.clone(),
            window,
            choices,
            picks,
            prompt,
            transcript,
            outstanding: RefCell::new(Vec::new()),
            _subscriptions: subscriptions,
        })
    }

    /// Identifier stamped on every transcript entry.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Choices in the order they were offered.
    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// The choice labelled `label`, if offered.
    #[must_use]
    pub fn choice(&self, label: &str) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.label() == label)
    }

    /// Labels of the choices that are currently available.
    #[must_use]
    pub fn available_labels(&self) -> Vec<&str> {
        self.choices
            .iter()
            .filter(|choice| choice.is_available())
            .map(Choice::label)
            .collect()
    }

    /// Reads "open" while the window is open and "closed" afterwards.
    #[must_use]
    pub fn prompt(&self) -> Observed<String> {
        self.prompt.value()
    }

    /// Entries recorded so far.
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether the window is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.window.is_entered()
    }

    /// Whether [`end`](Self::end) has been called.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.picks.is_done()
    }

    /// Schedules a pick of the choice labelled `label`.
    ///
    /// # Errors
    ///
    /// Returns `DialogError::UnknownChoice` if no choice has that label.
    pub fn pick(&self, label: &str) -> Result<Pending<Picked>, DialogError> {
        let choice = self
            .choice(label)
            .ok_or_else(|| DialogError::UnknownChoice(label.to_owned()))?;
        let pending = choice.pick();
        self.outstanding
            .borrow_mut()
            .push((label.to_owned(), pending.clone()));
        Ok(pending)
    }

    /// Closes the window. Returns `false` if it was already closed.
    ///
    /// # Errors
    ///
    /// Returns `DialogError::Reactive` if the dialog has ended.
    pub fn close_window(&self) -> Result<bool, DialogError> {
        Ok(self.window.exit(())?)
    }

    /// Re-opens the window. Returns `false` if it was already open.
    ///
    /// # Errors
    ///
    /// Returns `DialogError::Reactive` if the dialog has ended.
    pub fn reopen_window(&self) -> Result<bool, DialogError> {
        Ok(self.window.enter(())?)
    }

    /// Runs scheduled work until idle and records rejected picks.
    ///
    /// # Errors
    ///
    /// Returns `DialogError::Reactive` if the scheduler turn limit is hit.
    pub fn run_turns(&self) -> Result<usize, DialogError> {
        let ran = self.scheduler.run_until_idle()?;
        let settled: Vec<(String, Pending<Picked>)> = {
            let mut outstanding = self.outstanding.borrow_mut();
            let (settled, waiting) = outstanding.drain(..).partition(|(_, p)| p.is_settled());
            *outstanding = waiting;
            settled
        };
        for (label, pending) in settled {
            if let Some(Err(err)) = pending.peek() {
                warn!(%label, %err, "pick rejected");
                self.transcript.record(EntryKind::PickRejected {
                    label,
                    reason: err.to_string(),
                });
            }
        }
        Ok(ran)
    }

    /// Ends the dialog: runs remaining work, stops accepting picks and
    /// closes the window for good.
    ///
    /// # Errors
    ///
    /// Returns `DialogError::Reactive` if the scheduler turn limit is hit.
    pub fn end(&self) -> Result<(), DialogError> {
        self.run_turns()?;
        self.picks.done();
        self.window.close();
        self.prompt.dispose();
        self.transcript.record(EntryKind::DialogEnded);
        info!(dialog_id = %self.id, "dialog ended");
        Ok(())
    }
}
