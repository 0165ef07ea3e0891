//! Personality-keyed message table.
//!
//! Content lives in data, not in control flow: each `(MessageKind,
//! Personality)` pair maps to one or more template lines, and one of them is
//! picked at random. Templates may use `{title}`, `{duration}` and
//! `{minutes}`. A pair with no lines falls back to the cheerful table.
//!
//! There is no memory of what was said before, so the same line can come up
//! twice in a row.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A task or event fired unresolved.
    Reminder,
    CheckIn,
    TestNotification,
    DailyCheckIn,
    Celebration,
    Snoozed,
    BreakStarted,
    BreakOver,
    HyperfocusStarted,
    HyperfocusStage3,
    HyperfocusStage4,
    HyperfocusStage5,
    HyperfocusRepeat,
    HyperfocusSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    #[default]
    Cheerful,
    Gentle,
    DrillSergeant,
    Butler,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Cheerful,
        Personality::Gentle,
        Personality::DrillSergeant,
        Personality::Butler,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Personality::Cheerful => "cheerful",
            Personality::Gentle => "gentle",
            Personality::DrillSergeant => "drill_sergeant",
            Personality::Butler => "butler",
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Personality::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "personality".into(),
                message: format!("unknown personality '{s}'"),
            })
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    pub title: String,
    pub duration: String,
    pub minutes: i64,
}

impl MessageContext {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

type Entry = (MessageKind, Personality, &'static [&'static str]);

const BUILTIN: &[Entry] = {
    use MessageKind::*;
    use Personality::*;
    &[
        (Reminder, Cheerful, &[
            "Hey! \"{title}\" is still waiting for you.",
            "Friendly nudge: {title}. You've got this!",
        ]),
        (Reminder, Gentle, &[
            "Whenever you're ready, {title} is still on your list.",
            "Just a soft reminder about {title}.",
        ]),
        (Reminder, DrillSergeant, &[
            "{title}. Now. Move it!",
            "I said {title}! Why is it not done yet?",
        ]),
        (Reminder, Butler, &[
            "Pardon the interruption, but {title} remains outstanding.",
            "If I may, {title} still awaits your attention.",
        ]),
        (CheckIn, Cheerful, &["Quick check-in: still on track?"]),
        (CheckIn, Gentle, &["How is it going? Take a breath and check in with yourself."]),
        (CheckIn, DrillSergeant, &["Status report! Are you working?"]),
        (CheckIn, Butler, &["A brief check-in, if you would. All proceeding well?"]),
        (TestNotification, Cheerful, &["This is a test reminder. Looks like everything works!"]),
        (DailyCheckIn, Cheerful, &["Time for your daily check-in."]),
        (DailyCheckIn, Butler, &["Your daily review is ready whenever convenient."]),
        (Celebration, Cheerful, &[
            "Woohoo! {title} is done!",
            "Nice work finishing {title}!",
        ]),
        (Celebration, Gentle, &["Well done. {title} is complete."]),
        (Celebration, DrillSergeant, &["{title} complete. Acceptable. Next!"]),
        (Celebration, Butler, &["Splendid. {title} has been seen to."]),
        (Snoozed, Cheerful, &["Okay, I'll remind you about {title} in {minutes} minutes."]),
        (Snoozed, DrillSergeant, &["{minutes} minutes. Not one more. {title} is waiting."]),
        (Snoozed, Butler, &["Very good. I shall mention {title} again in {minutes} minutes."]),
        (BreakStarted, Cheerful, &["Enjoy your break! I'll stay quiet for {duration}."]),
        (BreakStarted, Gentle, &["Rest well. No reminders for {duration}."]),
        (BreakStarted, DrillSergeant, &["Break granted: {duration}. Use it wisely."]),
        (BreakStarted, Butler, &["I shall hold all reminders for {duration}."]),
        (BreakOver, Cheerful, &["Break's over! Ready to jump back in?"]),
        (BreakOver, Gentle, &["Your break has ended. Ease back in when you can."]),
        (BreakOver, DrillSergeant, &["Break's over! Back to work!"]),
        (BreakOver, Butler, &["Your break has concluded. Shall we resume?"]),
        (HyperfocusStarted, Cheerful, &["Hyperfocus on! I'll keep the self-care reminders quiet."]),
        (HyperfocusStarted, Gentle, &["Deep work started. I'll check on you now and then."]),
        (HyperfocusStarted, DrillSergeant, &["Focus mode engaged. Lock in!"]),
        (HyperfocusStarted, Butler, &["Do not disturb, understood. I shall keep an eye on the clock."]),
        (HyperfocusStage3, Cheerful, &["An hour of focus already! Maybe grab some water?"]),
        (HyperfocusStage3, Gentle, &["You've been focused for an hour. A sip of water might feel nice."]),
        (HyperfocusStage3, DrillSergeant, &["Sixty minutes. Hydrate, then continue."]),
        (HyperfocusStage3, Butler, &["One hour has passed. May I suggest some refreshment?"]),
        (HyperfocusStage4, Cheerful, &["Ninety minutes in! Stretch those legs for a sec."]),
        (HyperfocusStage4, Gentle, &["An hour and a half now. Your body might like a stretch."]),
        (HyperfocusStage4, DrillSergeant, &["Ninety minutes. On your feet, stretch, sit back down."]),
        (HyperfocusStage4, Butler, &["Ninety minutes, if I may. A brief stretch would not go amiss."]),
        (HyperfocusStage5, Cheerful, &["Two hours of hyperfocus! Time for a real break soon?"]),
        (HyperfocusStage5, Gentle, &["It's been two hours. Please consider resting for a bit."]),
        (HyperfocusStage5, DrillSergeant, &["Two hours! Even machines need maintenance. Break!"]),
        (HyperfocusStage5, Butler, &["Two hours have elapsed. I must insist on a pause."]),
        (HyperfocusRepeat, Cheerful, &["Still going after {minutes} minutes! Don't forget to eat."]),
        (HyperfocusRepeat, Gentle, &["{minutes} minutes now. Be kind to yourself and take a pause."]),
        (HyperfocusRepeat, DrillSergeant, &["{minutes} minutes! Stand down and refuel!"]),
        (HyperfocusRepeat, Butler, &["{minutes} minutes, and counting. Perhaps a light meal?"]),
        (HyperfocusSummary, Cheerful, &["Hyperfocus done: {duration} of deep work. Amazing!"]),
        (HyperfocusSummary, Gentle, &["You focused for {duration}. Rest well."]),
        (HyperfocusSummary, DrillSergeant, &["Session logged: {duration}. Dismissed."]),
        (HyperfocusSummary, Butler, &["A most productive {duration}, if I may say so."]),
    ]
};

/// Lookup table from `(kind, personality)` to template lines.
#[derive(Debug, Clone)]
pub struct MessageTable {
    lines: HashMap<(MessageKind, Personality), Vec<String>>,
    rng: Pcg32,
}

impl MessageTable {
    /// Built-in lines, randomly seeded.
    pub fn builtin() -> Self {
        Self::builtin_with_seed(rand::thread_rng().gen())
    }

    /// Built-in lines with a fixed seed, for reproducible choices.
    pub fn builtin_with_seed(seed: u64) -> Self {
        let lines = BUILTIN
            .iter()
            .map(|(kind, personality, lines)| {
                (
                    (*kind, *personality),
                    lines.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self {
            lines,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Replace the lines for one pair.
    pub fn set_lines(&mut self, kind: MessageKind, personality: Personality, lines: Vec<String>) {
        self.lines.insert((kind, personality), lines);
    }

    /// Every candidate template for a pair, after fallback.
    pub fn templates(&self, kind: MessageKind, personality: Personality) -> &[String] {
        self.lines
            .get(&(kind, personality))
            .filter(|l| !l.is_empty())
            .or_else(|| self.lines.get(&(kind, Personality::Cheerful)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Pick one line and fill in its placeholders.
    pub fn compose(
        &mut self,
        kind: MessageKind,
        personality: Personality,
        ctx: &MessageContext,
    ) -> String {
        let count = self.templates(kind, personality).len();
        if count == 0 {
            return ctx.title.clone();
        }
        let index = self.rng.gen_range(0..count);
        render(&self.templates(kind, personality)[index], ctx)
    }
}

impl Default for MessageTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn render(template: &str, ctx: &MessageContext) -> String {
    template
        .replace("{title}", &ctx.title)
        .replace("{duration}", &ctx.duration)
        .replace("{minutes}", &ctx.minutes.to_string())
}
