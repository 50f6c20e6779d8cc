//! Sub-intent detection for the scheduling flow.
//!
//! Signals are keyed off the current [`FlowState`]: a bare "2" is a slot pick
//! while slots are on offer, and noise otherwise.

use chrono::{DateTime, Datelike, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::flow::state::FlowState;
use crate::pipeline::patterns::normalize;
use crate::pipeline::types::TimeOfDay;

/// When a candidate says they are free.
///
/// Empty lists mean "any": a candidate who says "anytime" gets an empty
/// preference set, which matches every slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPreferences {
    pub days: Vec<Weekday>,
    pub times_of_day: Vec<TimeOfDay>,
}

const FLEXIBLE_PHRASES: &[&str] = &[
    "any time",
    "anytime",
    "whenever",
    "flexible",
    "any day",
    "free all week",
];

const WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

impl SlotPreferences {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        self.days.is_empty() && self.times_of_day.is_empty()
    }

    /// Extract day and time-of-day preferences.
    ///
    /// Returns `None` when the text says nothing about availability.
    /// `today` resolves "today" and "tomorrow".
    pub fn parse(text: &str, today: Weekday) -> Option<Self> {
        let norm = normalize(text);
        let padded = format!(" {norm} ");
        let mut prefs = Self::default();

        for word in norm.split(' ') {
            let days: &[Weekday] = match word {
                "monday" | "mon" => &[Weekday::Mon],
                "tuesday" | "tue" | "tues" => &[Weekday::Tue],
                "wednesday" | "wed" => &[Weekday::Wed],
                "thursday" | "thu" | "thur" | "thurs" => &[Weekday::Thu],
                "friday" | "fri" => &[Weekday::Fri],
                "saturday" | "sat" => &[Weekday::Sat],
                "sunday" | "sun" => &[Weekday::Sun],
                "weekend" | "weekends" => &[Weekday::Sat, Weekday::Sun],
                "weekday" | "weekdays" => &WEEKDAYS,
                _ => &[],
            };
            for day in days {
                push_unique(&mut prefs.days, *day);
            }

            match word {
                "today" => push_unique(&mut prefs.days, today),
                "tomorrow" | "tmr" | "tmrw" => push_unique(&mut prefs.days, today.succ()),
                "morning" | "mornings" => push_unique(&mut prefs.times_of_day, TimeOfDay::Morning),
                "afternoon" | "afternoons" | "lunchtime" => {
                    push_unique(&mut prefs.times_of_day, TimeOfDay::Afternoon)
                }
                "evening" | "evenings" | "tonight" => {
                    push_unique(&mut prefs.times_of_day, TimeOfDay::Evening)
                }
                _ => {}
            }
        }

        if !prefs.is_any() {
            return Some(prefs);
        }
        FLEXIBLE_PHRASES
            .iter()
            .any(|p| padded.contains(&format!(" {p} ")))
            .then(Self::any)
    }

    /// Whether a slot start (already in business time) fits these preferences.
    pub fn matches<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let day_ok = self.days.is_empty() || self.days.contains(&at.weekday());
        let time_ok = self.times_of_day.is_empty() || self.times_of_day.contains(&TimeOfDay::of(at));
        day_ok && time_ok
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// A scheduling sub-intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowSignal {
    /// Wants to book an interview, possibly already naming availability.
    StartScheduling(Option<SlotPreferences>),
    Availability(SlotPreferences),
    /// 1-based position in the offered list.
    SlotPick(usize),
    Confirm,
    /// Said no to the slot awaiting confirmation.
    RejectSlot,
    Decline,
    Reschedule,
}

const DECLINE_PHRASES: &[&str] = &[
    "cancel",
    "never mind",
    "nevermind",
    "not now",
    "not interested",
    "no thanks",
    "maybe later",
    "stop",
];

const RESCHEDULE_PHRASES: &[&str] = &[
    "reschedule",
    "different time",
    "another time",
    "change my interview",
    "move my interview",
    "change the time",
];

const CONFIRM_WORDS: &[&str] = &[
    "yes", "yep", "yeah", "ya", "yup", "ok", "okay", "confirm", "sure", "correct",
];

const CONFIRM_PHRASES: &[&str] = &["sounds good", "book it", "go ahead", "that works"];

const REJECT_WORDS: &[&str] = &["no", "nope", "nah"];

const SCHEDULING_WORDS: &[&str] = &[
    "interview",
    "schedule",
    "reschedule",
    "book",
    "booking",
    "appointment",
    "slot",
    "slots",
];

const ORDINALS: &[(&str, usize)] = &[
    ("first", 1),
    ("second", 2),
    ("third", 3),
    ("fourth", 4),
    ("fifth", 5),
];

/// Detect a scheduling sub-intent given where the candidate is in the flow.
pub fn detect_signal(text: &str, state: FlowState, today: Weekday) -> Option<FlowSignal> {
    let norm = normalize(text);
    if norm.is_empty() {
        return None;
    }
    let padded = format!(" {norm} ");
    let has_phrase = |phrases: &[&str]| phrases.iter().any(|p| padded.contains(&format!(" {p} ")));
    let words: Vec<&str> = norm.split(' ').collect();
    let has_word = |set: &[&str]| words.iter().any(|w| set.contains(w));

    if has_phrase(RESCHEDULE_PHRASES) && (state.is_active() || state == FlowState::Scheduled) {
        return Some(FlowSignal::Reschedule);
    }
    if state.is_active() && has_phrase(DECLINE_PHRASES) {
        return Some(FlowSignal::Decline);
    }

    match state {
        FlowState::ConfirmingBooking => {
            if has_word(REJECT_WORDS) {
                return Some(FlowSignal::RejectSlot);
            }
            if has_word(CONFIRM_WORDS) || has_phrase(CONFIRM_PHRASES) {
                return Some(FlowSignal::Confirm);
            }
            if let Some(index) = slot_pick(&words) {
                return Some(FlowSignal::SlotPick(index));
            }
            None
        }
        FlowState::OfferingSlots => slot_pick(&words)
            .map(FlowSignal::SlotPick)
            .or_else(|| SlotPreferences::parse(text, today).map(FlowSignal::Availability)),
        FlowState::SchedulingStarted | FlowState::CollectingAvailability => {
            SlotPreferences::parse(text, today).map(FlowSignal::Availability)
        }
        FlowState::InitialEngagement | FlowState::Scheduled => has_word(SCHEDULING_WORDS)
            .then(|| FlowSignal::StartScheduling(SlotPreferences::parse(text, today))),
    }
}

/// First token that reads as a list position: "2", "2nd", "option 2", "second".
fn slot_pick(words: &[&str]) -> Option<usize> {
    words.iter().find_map(|word| {
        if let Some((_, n)) = ORDINALS.iter().find(|(name, _)| name == word) {
            return Some(*n);
        }
        let split = word
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(word.len());
        let (digits, suffix) = word.split_at(split);
        if digits.len() != 1 || !matches!(suffix, "" | "st" | "nd" | "rd" | "th") {
            return None;
        }
        digits.parse::<usize>().ok().filter(|n| *n >= 1)
    })
}
