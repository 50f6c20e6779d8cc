//! Template families and the dispatch table that picks one.
//!
//! Every family is a fixed list of literal variants. Placeholders in braces
//! are filled by the generator; anything left unfilled is rejected later by
//! the validator's character gate.

use crate::pipeline::types::{CandidateStatus, ChannelStyle, IntentCategory};

/// A named set of interchangeable reply variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFamily {
    PendingGreeting,
    ActiveGreeting,
    SuspendedGreeting,
    GeneralGreeting,
    Gratitude,
    PendingVerification,
    PendingVerificationBooked,
    ActiveVerification,
    AccountReview,
    ActiveInterview,
    ActiveJobs,
    PendingJobs,
    InactiveJobs,
    ActivePayment,
    PendingPayment,
    PaymentReview,
    TechnicalHelp,
    AccountHelp,
    DataRequestHolding,
    UrgentHolding,
    ComplaintHolding,
    // Scheduling flow
    AskAvailability,
    SlotOffer,
    NoSlots,
    ConfirmSlot,
    Booked,
    AlreadyScheduled,
    Conflict,
    ConflictNoAlternatives,
    InvalidPick,
    Declined,
    RepromptConfirm,
}

impl TemplateFamily {
    pub const ALL: &'static [TemplateFamily] = &[
        Self::PendingGreeting,
        Self::ActiveGreeting,
        Self::SuspendedGreeting,
        Self::GeneralGreeting,
        Self::Gratitude,
        Self::PendingVerification,
        Self::PendingVerificationBooked,
        Self::ActiveVerification,
        Self::AccountReview,
        Self::ActiveInterview,
        Self::ActiveJobs,
        Self::PendingJobs,
        Self::InactiveJobs,
        Self::ActivePayment,
        Self::PendingPayment,
        Self::PaymentReview,
        Self::TechnicalHelp,
        Self::AccountHelp,
        Self::DataRequestHolding,
        Self::UrgentHolding,
        Self::ComplaintHolding,
        Self::AskAvailability,
        Self::SlotOffer,
        Self::NoSlots,
        Self::ConfirmSlot,
        Self::Booked,
        Self::AlreadyScheduled,
        Self::Conflict,
        Self::ConflictNoAlternatives,
        Self::InvalidPick,
        Self::Declined,
        Self::RepromptConfirm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PendingGreeting => "pending_greeting",
            Self::ActiveGreeting => "active_greeting",
            Self::SuspendedGreeting => "suspended_greeting",
            Self::GeneralGreeting => "general_greeting",
            Self::Gratitude => "gratitude",
            Self::PendingVerification => "pending_verification",
            Self::PendingVerificationBooked => "pending_verification_booked",
            Self::ActiveVerification => "active_verification",
            Self::AccountReview => "account_review",
            Self::ActiveInterview => "active_interview",
            Self::ActiveJobs => "active_jobs",
            Self::PendingJobs => "pending_jobs",
            Self::InactiveJobs => "inactive_jobs",
            Self::ActivePayment => "active_payment",
            Self::PendingPayment => "pending_payment",
            Self::PaymentReview => "payment_review",
            Self::TechnicalHelp => "technical_help",
            Self::AccountHelp => "account_help",
            Self::DataRequestHolding => "data_request_holding",
            Self::UrgentHolding => "urgent_holding",
            Self::ComplaintHolding => "complaint_holding",
            Self::AskAvailability => "ask_availability",
            Self::SlotOffer => "slot_offer",
            Self::NoSlots => "no_slots",
            Self::ConfirmSlot => "confirm_slot",
            Self::Booked => "booked",
            Self::AlreadyScheduled => "already_scheduled",
            Self::Conflict => "conflict",
            Self::ConflictNoAlternatives => "conflict_no_alternatives",
            Self::InvalidPick => "invalid_pick",
            Self::Declined => "declined",
            Self::RepromptConfirm => "reprompt_confirm",
        }
    }

    /// Literal variants for a channel style.
    pub fn variants(&self, style: ChannelStyle) -> &'static [&'static str] {
        match (self, style) {
            (Self::PendingGreeting, _) => &[
                "Hi {first_name}! 👋 Thanks for signing up. Your next step is a short verification interview. Want to pick a time?",
                "Hello {first_name}! Welcome aboard. To start taking jobs, you will need a quick verification interview. Shall we find a slot for you?",
                "Hey {first_name}! Great to hear from you. Once your verification interview is done you can start working. Would you like to book it now?",
            ],
            (Self::ActiveGreeting, ChannelStyle::Structured) => &[
                "Hi {first_name}! 👋 What can we help with today?\n• **Jobs**: find new shifts\n• **Earnings**: check your payouts\n• **Account**: update your details",
                "Hello {first_name}! Here is what we can help with:\n• Browse open shifts\n• Check a payment\n• Update your profile",
            ],
            (Self::ActiveGreeting, ChannelStyle::Conversational) => &[
                "Hi {first_name}! 👋 Good to see you. Looking for new shifts today, or is there something else we can help with?",
                "Hello {first_name}! What can we help you with today? You can ask about jobs, payments, or your account.",
                "Hey {first_name}! Nice to hear from you. Let us know what you need and we'll point you in the right direction.",
            ],
            (Self::SuspendedGreeting, _) => &[
                "Hi {first_name}. Your account is currently on hold, so some features are limited. Tell us what you need and a member of our team will follow up.",
                "Hello {first_name}. Your account is paused at the moment. Let us know how we can help and our team will review it.",
            ],
            (Self::GeneralGreeting, _) => &[
                "Hi {first_name}! 👋 Thanks for reaching out. How can we help you today?",
                "Hello {first_name}! What can we do for you today?",
                "Hey {first_name}! Good to hear from you. What do you need help with?",
            ],
            (Self::Gratitude, _) => &[
                "You are welcome, {first_name}! Anything else we can help with?",
                "Happy to help! Let us know if anything else comes up. 😊",
                "Anytime, {first_name}! We are here if you need anything else.",
            ],
            (Self::PendingVerification, _) => &[
                "Your application is still in review, {first_name}. You have been in the queue for {days_waiting}. Booking your verification interview is the fastest way forward. Want to see open slots?",
                "Thanks for checking in! Your profile is waiting for a short verification interview ({days_waiting} in the queue so far). Shall we find a time that suits you?",
            ],
            (Self::PendingVerificationBooked, _) => &[
                "You are all set for your verification interview on {slot_time}. Join here when it is time: {meeting_link}",
                "Your verification interview is on {slot_time}. Here is the link to join: {meeting_link}",
            ],
            (Self::ActiveVerification, _) => &[
                "Good news, {first_name}: you are already a verified worker, so you can apply for any open job in the app.",
                "You are fully verified and ready to work, {first_name}. Check the Jobs tab for the latest openings!",
            ],
            (Self::AccountReview, _) => &[
                "We could not find an active verification for your account. Share your registered phone number or email and our team will take a look.",
                "Let us check your status together. Please send the phone number or email you signed up with and a team member will follow up.",
            ],
            (Self::ActiveInterview, _) => &[
                "You are already verified, so there is no interview to book. If you mean an interview with a client, check the job details in the app.",
            ],
            (Self::ActiveJobs, _) => &[
                "New jobs are posted every day, {first_name}. Open the Jobs tab to browse shifts near you and apply in a couple of taps.",
                "Looking for work? The Jobs tab shows every open shift that matches your profile. Turn on notifications so you never miss a new one!",
            ],
            (Self::PendingJobs, _) => &[
                "You will be able to apply for jobs once your verification interview is done. Want to book it now so you can start sooner?",
                "Jobs unlock once you are verified! The quickest route is to book your short verification interview. Shall we find a time?",
            ],
            (Self::InactiveJobs, _) => &[
                "To see open jobs, your account needs to be active. Tell us a bit more about your situation and our team will help you get back on track.",
            ],
            (Self::ActivePayment, _) => &[
                "Payments for completed shifts are sent weekly, {first_name}. You can track every payout under Earnings in the app. If something looks wrong, reply here with the job date.",
                "You can see the status of each payment in the Earnings tab. Payouts usually arrive a few working days after the client signs off a shift. Let us know if one is missing!",
            ],
            (Self::PendingPayment, _) => &[
                "Payments start once you are verified and have completed your first shift. Want to book your verification interview?",
            ],
            (Self::PaymentReview, _) => &[
                "Thanks for asking about your payment. Our finance team can look into this for you. Please share the job date and the amount you expected.",
            ],
            (Self::TechnicalHelp, ChannelStyle::Structured) => &[
                "Sorry about the trouble! Here is what usually helps:\n• Update the app to the latest version\n• Log out and back in\n• Restart your phone\nStill stuck? Send us a screenshot.",
            ],
            (Self::TechnicalHelp, ChannelStyle::Conversational) => &[
                "Sorry about the trouble, {first_name}! Please try updating the app and restarting your phone. If it still does not work, send us a screenshot and we'll take a look.",
                "That sounds frustrating. A quick fix that often helps: log out, update to the latest version, then log back in. Still stuck? Reply with what you see on screen.",
            ],
            (Self::AccountHelp, _) => &[
                "You can update most of your details under Profile in the app. If something cannot be changed there, tell us what needs updating and our team will help.",
                "Need to change your details? Head to Profile, then Edit. For anything you cannot edit yourself, reply here with the change you need.",
            ],
            (Self::DataRequestHolding, _) => &[
                "Thanks for your request about your personal data. Our compliance team handles these and will get in touch with you.",
            ],
            (Self::UrgentHolding, _) => &[
                "We hear you, {first_name}. A member of our team is being alerted about your message.",
            ],
            (Self::ComplaintHolding, _) => &[
                "We are sorry to hear this, {first_name}. Your feedback matters and a senior team member will review it personally.",
            ],
            (Self::AskAvailability, _) => &[
                "Great, let us get your interview booked! Which days and times work best for you? For example: \"Monday morning\" or \"anytime\".",
                "Sure! When are you usually free? Tell us a day or a time of day, like \"Tuesday afternoon\".",
            ],
            (Self::SlotOffer, _) => &[
                "Here are the next open interview slots:\n{slot_list}\nReply with the number of the one you want.",
                "These interview times are available:\n{slot_list}\nJust reply with a number to pick one.",
            ],
            (Self::NoSlots, _) => &[
                "There are no open slots that match those times. Could you share a different day or time of day that works for you?",
                "Nothing free at those times, sorry! Try another day, or say \"anytime\" and we'll show the earliest slots.",
            ],
            (Self::ConfirmSlot, _) => &[
                "You picked {slot_time}. Shall we lock it in? Reply yes to confirm or no to choose another time.",
                "{slot_time} it is? Reply yes to confirm, or no to see other options.",
            ],
            (Self::Booked, _) => &[
                "You are booked in for {slot_time}! 🎉 Join with this link: {meeting_link}",
                "All set! Your verification interview is on {slot_time}. Here is your link: {meeting_link}",
            ],
            (Self::AlreadyScheduled, _) => &[
                "Your verification interview is on {slot_time}. Join here: {meeting_link} Need a different time? Just say reschedule.",
            ],
            (Self::Conflict, _) => &[
                "Sorry, that slot was just taken by someone else. Here are other open times:\n{slot_list}\nReply with a number to pick one.",
                "That time is no longer free, sorry about that! These slots are still open:\n{slot_list}\nWhich one works for you?",
            ],
            (Self::ConflictNoAlternatives, _) => &[
                "Sorry, that slot was just taken and there are no other open times at the moment. Could you suggest another day that works for you?",
            ],
            (Self::InvalidPick, _) => &[
                "Hmm, that number is not on the list. Here are the open slots again:\n{slot_list}",
            ],
            (Self::Declined, _) => &[
                "No problem! Whenever you are ready to book your interview, just let us know.",
                "Okay, we will leave it there for now. Message us any time you want to pick an interview slot.",
            ],
            (Self::RepromptConfirm, _) => &[
                "Reply yes to confirm your interview slot, or no to pick a different time.",
            ],
        }
    }

    /// Whether replies from this family hand the conversation to a human.
    pub fn escalates(&self) -> bool {
        matches!(
            self,
            Self::UrgentHolding | Self::ComplaintHolding | Self::DataRequestHolding
        )
    }
}

/// The dispatch table: (intent, status) to a template family.
///
/// `None` means the intent has no local handler and goes to the generative
/// fallback.
pub fn select_family(intent: IntentCategory, status: CandidateStatus) -> Option<TemplateFamily> {
    use CandidateStatus as S;
    use IntentCategory as I;
    use TemplateFamily as F;

    let family = match (intent, status) {
        (I::Greeting, S::Pending) => F::PendingGreeting,
        (I::Greeting, S::Active) => F::ActiveGreeting,
        (I::Greeting, S::Suspended) => F::SuspendedGreeting,
        (I::Greeting, S::Inactive | S::Unknown) => F::GeneralGreeting,

        (I::Gratitude, _) => F::Gratitude,

        (I::VerificationStatus, S::Pending) => F::PendingVerification,
        (I::VerificationStatus, S::Active) => F::ActiveVerification,
        (I::VerificationStatus, S::Suspended | S::Inactive | S::Unknown) => F::AccountReview,

        (I::InterviewScheduling, S::Active) => F::ActiveInterview,
        (I::InterviewScheduling, _) => F::AskAvailability,

        (I::JobSearch, S::Active) => F::ActiveJobs,
        (I::JobSearch, S::Pending) => F::PendingJobs,
        (I::JobSearch, S::Suspended | S::Inactive | S::Unknown) => F::InactiveJobs,

        (I::PaymentInquiry, S::Active) => F::ActivePayment,
        (I::PaymentInquiry, S::Pending) => F::PendingPayment,
        (I::PaymentInquiry, S::Suspended | S::Inactive | S::Unknown) => F::PaymentReview,

        (I::TechnicalSupport, _) => F::TechnicalHelp,
        (I::AccountManagement, _) => F::AccountHelp,

        (I::UrgentEscalation, _) => F::UrgentHolding,
        (I::Complaint, _) => F::ComplaintHolding,

        (I::GeneralHelp, _) => return None,
    };
    Some(family)
}
