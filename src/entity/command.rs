//! Slash command declarations.
//!
//! Every builder here validates as it goes, so a [`CommandData`] that exists
//! is one the platform accepts: names match [`NAME_PATTERN`] and are
//! lowercase, lengths stay within the platform limits, and option trees obey
//! the nesting and ordering rules.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ChannelKind;

/// Maximum length of a command or option name.
pub const MAX_NAME_LENGTH: usize = 32;
/// Maximum length of a command or option description.
pub const MAX_DESCRIPTION_LENGTH: usize = 100;
/// Maximum number of options under one command or option.
pub const MAX_OPTION_COUNT: usize = 25;
/// Maximum number of choices of one option, or of one autocomplete reply.
pub const MAX_CHOICE_COUNT: usize = 25;
/// Maximum length of a choice name.
pub const MAX_CHOICE_NAME_LENGTH: usize = 100;
/// Maximum length of a string choice value.
pub const MAX_CHOICE_STRING_LENGTH: usize = 100;
/// Upper bound for string option length limits.
pub const MAX_STRING_OPTION_LENGTH: usize = 6000;
/// Largest magnitude accepted for numeric bounds.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_992;

const MIN_SAFE_INTEGER: i64 = -9_007_199_254_740_992;
const MAX_SAFE_NUMBER: f64 = 9_007_199_254_740_992.0;
const MIN_SAFE_NUMBER: f64 = -9_007_199_254_740_992.0;

/// Pattern every command and option name must match.
pub const NAME_PATTERN: &str = r"^[-_\p{L}\p{N}\p{Devanagari}\p{Thai}]{1,32}$";

static NAME_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(NAME_PATTERN).ok());

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a command declaration is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandDataError {
    /// A required text is empty or whitespace.
    #[error("{field} must not be blank")]
    Blank {
        /// Offending field.
        field: &'static str,
    },

    /// A text exceeds its length limit.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Limit in characters.
        max: usize,
    },

    /// A name does not match [`NAME_PATTERN`].
    #[error("{field} '{value}' must match {pattern}", pattern = NAME_PATTERN)]
    InvalidName {
        /// Offending field.
        field: &'static str,
        /// Rejected value.
        value: String,
    },

    /// A name contains letters that have a lowercase variant.
    #[error("{field} '{value}' must not contain uppercase letters")]
    NotLowercase {
        /// Offending field.
        field: &'static str,
        /// Rejected value.
        value: String,
    },

    /// A localized text failed validation.
    #[error("{locale} localization: {source}")]
    Localized {
        /// Locale of the rejected entry.
        locale: Locale,
        /// Underlying failure.
        source: Box<CommandDataError>,
    },

    /// Locale code not known to the platform.
    #[error("unknown locale '{0}'")]
    UnknownLocale(String),

    /// Too many options under one parent.
    #[error("at most {max} options are allowed", max = MAX_OPTION_COUNT)]
    TooManyOptions,

    /// Two sibling options share a name.
    #[error("duplicate option name '{0}'")]
    DuplicateOption(String),

    /// Subcommands, subcommand groups and plain options cannot be mixed.
    #[error("option type {kind} is incompatible with sibling option type {sibling}")]
    IncompatibleSiblings {
        /// Kind of the option being added.
        kind: OptionKind,
        /// Kind of the conflicting sibling.
        sibling: OptionKind,
    },

    /// A required option follows an optional sibling.
    #[error("required option '{0}' cannot follow an optional one")]
    RequiredAfterOptional(String),

    /// Subcommands and groups are always required.
    #[error("{0} options are always required")]
    OptionalSubcommand(OptionKind),

    /// A child option is not allowed under its parent.
    #[error("{parent} options cannot contain {child} options")]
    InvalidNesting {
        /// Parent option kind.
        parent: OptionKind,
        /// Rejected child kind.
        child: OptionKind,
    },

    /// A setting does not apply to this option kind.
    #[error("{what} is not applicable to {kind} options")]
    NotApplicable {
        /// Option kind.
        kind: OptionKind,
        /// Rejected setting.
        what: &'static str,
    },

    /// A choice value has a different type than its option.
    #[error("choice of type {choice} does not match option type {kind}")]
    ChoiceKindMismatch {
        /// Option kind.
        kind: OptionKind,
        /// Choice value kind.
        choice: OptionKind,
    },

    /// Choices in one list carry values of different types.
    #[error("choices must share a single value type")]
    MixedChoices,

    /// Too many choices.
    #[error("at most {max} choices are allowed", max = MAX_CHOICE_COUNT)]
    TooManyChoices,

    /// Fixed choices and autocomplete exclude each other.
    #[error("choices and autocomplete cannot be combined")]
    ChoicesWithAutocomplete,

    /// A bound lies outside what the platform accepts.
    #[error("{field} is out of range")]
    OutOfRange {
        /// Offending bound.
        field: &'static str,
    },

    /// A lower bound exceeds its upper bound.
    #[error("minimum {field} exceeds maximum")]
    InvertedBounds {
        /// Offending bound pair.
        field: &'static str,
    },

    /// The unknown channel kind cannot restrict a channel option.
    #[error("unknown channel kind cannot restrict a channel option")]
    UnknownChannelKind,
}

// ---------------------------------------------------------------------------
// Locales
// ---------------------------------------------------------------------------

macro_rules! locales {
    ($($variant:ident => $code:literal, $doc:literal;)+) => {
        /// Locale the platform accepts for localized names and descriptions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Locale {
            $(
                #[doc = $doc]
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl Locale {
            /// Every known locale.
            pub const ALL: &'static [Locale] = &[$(Self::$variant),+];

            /// Platform locale code, e.g. `en-US`.
            pub fn code(self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }
    };
}

locales! {
    Danish => "da", "Danish.";
    German => "de", "German.";
    EnglishUk => "en-GB", "English, UK.";
    EnglishUs => "en-US", "English, US.";
    Spanish => "es-ES", "Spanish.";
    SpanishLatam => "es-419", "Spanish, Latin America.";
    French => "fr", "French.";
    Croatian => "hr", "Croatian.";
    Italian => "it", "Italian.";
    Lithuanian => "lt", "Lithuanian.";
    Hungarian => "hu", "Hungarian.";
    Dutch => "nl", "Dutch.";
    Norwegian => "no", "Norwegian.";
    Polish => "pl", "Polish.";
    PortugueseBrazilian => "pt-BR", "Portuguese, Brazilian.";
    Romanian => "ro", "Romanian.";
    Finnish => "fi", "Finnish.";
    Swedish => "sv-SE", "Swedish.";
    Vietnamese => "vi", "Vietnamese.";
    Turkish => "tr", "Turkish.";
    Czech => "cs", "Czech.";
    Greek => "el", "Greek.";
    Bulgarian => "bg", "Bulgarian.";
    Russian => "ru", "Russian.";
    Ukrainian => "uk", "Ukrainian.";
    Hindi => "hi", "Hindi.";
    Thai => "th", "Thai.";
    ChineseChina => "zh-CN", "Chinese, China.";
    Japanese => "ja", "Japanese.";
    ChineseTaiwan => "zh-TW", "Chinese, Taiwan.";
    Korean => "ko", "Korean.";
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = CommandDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|locale| locale.code() == s)
            .ok_or_else(|| CommandDataError::UnknownLocale(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn check_text(value: &str, max: usize, field: &'static str) -> Result<(), CommandDataError> {
    if value.trim().is_empty() {
        return Err(CommandDataError::Blank { field });
    }
    if value.chars().count() > max {
        return Err(CommandDataError::TooLong { field, max });
    }
    Ok(())
}

fn check_name(value: &str, field: &'static str) -> Result<(), CommandDataError> {
    check_text(value, MAX_NAME_LENGTH, field)?;
    let matches = NAME_REGEX
        .as_ref()
        .is_some_and(|regex| regex.is_match(value));
    if !matches {
        return Err(CommandDataError::InvalidName {
            field,
            value: value.to_owned(),
        });
    }
    if value.to_lowercase() != value {
        return Err(CommandDataError::NotLowercase {
            field,
            value: value.to_owned(),
        });
    }
    Ok(())
}

fn check_description(value: &str, field: &'static str) -> Result<(), CommandDataError> {
    check_text(value, MAX_DESCRIPTION_LENGTH, field)
}

fn localized<S, F>(
    entries: impl IntoIterator<Item = (Locale, S)>,
    check: F,
) -> Result<BTreeMap<Locale, String>, CommandDataError>
where
    S: Into<String>,
    F: Fn(&str) -> Result<(), CommandDataError>,
{
    entries
        .into_iter()
        .map(|(locale, text)| {
            let text = text.into();
            check(&text).map_err(|source| CommandDataError::Localized {
                locale,
                source: Box::new(source),
            })?;
            Ok((locale, text))
        })
        .collect()
}

/// Whether two option kinds may not sit side by side.
///
/// Groups pair only with groups and subcommands only with subcommands;
/// plain options pair with each other freely.
fn incompatible(left: OptionKind, right: OptionKind) -> bool {
    let both_groups = left == OptionKind::SubCommandGroup && right == OptionKind::SubCommandGroup;
    let both_subcommands = left == OptionKind::SubCommand && right == OptionKind::SubCommand;
    !both_groups && !both_subcommands && (left.is_subcommand() || right.is_subcommand())
}

fn push_option(
    options: &mut Vec<CommandOptionData>,
    option: CommandOptionData,
) -> Result<(), CommandDataError> {
    if options.len() >= MAX_OPTION_COUNT {
        return Err(CommandDataError::TooManyOptions);
    }
    if options.iter().any(|sibling| sibling.name == option.name) {
        return Err(CommandDataError::DuplicateOption(option.name));
    }
    if let Some(sibling) = options
        .iter()
        .find(|sibling| incompatible(sibling.kind, option.kind))
    {
        return Err(CommandDataError::IncompatibleSiblings {
            kind: option.kind,
            sibling: sibling.kind,
        });
    }
    if option.is_required() && options.iter().any(|sibling| !sibling.is_required()) {
        return Err(CommandDataError::RequiredAfterOptional(option.name));
    }
    options.push(option);
    Ok(())
}

fn check_choices(choices: &[OptionChoice]) -> Result<(), CommandDataError> {
    if choices.len() > MAX_CHOICE_COUNT {
        return Err(CommandDataError::TooManyChoices);
    }
    let mut kinds = choices.iter().map(|choice| choice.value.kind());
    if let Some(first) = kinds.next() {
        if kinds.any(|kind| kind != first) {
            return Err(CommandDataError::MixedChoices);
        }
    }
    Ok(())
}

/// Validate a list of autocomplete suggestions.
pub(crate) fn check_suggestions(choices: &[OptionChoice]) -> Result<(), CommandDataError> {
    check_choices(choices)
}

// ---------------------------------------------------------------------------
// Option kinds and choices
// ---------------------------------------------------------------------------

/// Type of a command option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    /// Nested subcommand.
    SubCommand,
    /// Group of subcommands.
    SubCommandGroup,
    /// Free text.
    String,
    /// Integer.
    Integer,
    /// Floating point number.
    Number,
    /// Boolean flag.
    Boolean,
    /// User reference.
    User,
    /// Channel reference.
    Channel,
    /// Role reference.
    Role,
    /// User or role reference.
    Mentionable,
    /// File attachment.
    Attachment,
}

impl OptionKind {
    /// Whether this kind structures the command tree instead of taking a value.
    pub fn is_subcommand(self) -> bool {
        matches!(self, Self::SubCommand | Self::SubCommandGroup)
    }

    /// Whether options of this kind accept fixed choices or autocomplete.
    pub fn can_have_choices(self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Number)
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubCommand => "sub_command",
            Self::SubCommandGroup => "sub_command_group",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::User => "user",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::Mentionable => "mentionable",
            Self::Attachment => "attachment",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of an option choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    /// Text value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// Number value.
    Number(f64),
}

impl ChoiceValue {
    /// Option kind this value belongs to.
    pub fn kind(&self) -> OptionKind {
        match self {
            Self::String(_) => OptionKind::String,
            Self::Integer(_) => OptionKind::Integer,
            Self::Number(_) => OptionKind::Number,
        }
    }
}

impl From<&str> for ChoiceValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ChoiceValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ChoiceValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ChoiceValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A predefined (or suggested) value of an option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionChoice {
    name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    name_localizations: BTreeMap<Locale, String>,
    value: ChoiceValue,
}

impl OptionChoice {
    /// Choice shown as `name`, submitting `value`.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<ChoiceValue>,
    ) -> Result<Self, CommandDataError> {
        let name = name.into();
        check_text(&name, MAX_CHOICE_NAME_LENGTH, "choice name")?;
        let value = value.into();
        if let ChoiceValue::String(text) = &value {
            check_text(text, MAX_CHOICE_STRING_LENGTH, "choice value")?;
        }
        Ok(Self {
            name,
            name_localizations: BTreeMap::new(),
            value,
        })
    }

    /// Localized display names.
    pub fn with_name_localizations<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = (Locale, S)>,
    ) -> Result<Self, CommandDataError> {
        self.name_localizations = localized(names, |name| {
            check_text(name, MAX_CHOICE_NAME_LENGTH, "choice name")
        })?;
        Ok(self)
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Localized display names.
    pub fn name_localizations(&self) -> &BTreeMap<Locale, String> {
        &self.name_localizations
    }

    /// Submitted value.
    pub fn value(&self) -> &ChoiceValue {
        &self.value
    }
}

/// Numeric bound of an integer or number option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValueBound {
    /// Bound of an integer option.
    Integer(i64),
    /// Bound of a number option.
    Number(f64),
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Declaration of one command option.
///
/// Options are required unless [`required(false)`](Self::required) says
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOptionData {
    name: String,
    description: String,
    #[serde(rename = "type")]
    kind: OptionKind,
    required: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    name_localizations: BTreeMap<Locale, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    description_localizations: BTreeMap<Locale, String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    autocomplete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    choices: Vec<OptionChoice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<CommandOptionData>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    channel_kinds: BTreeSet<ChannelKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_value: Option<ValueBound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_value: Option<ValueBound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
}

impl CommandOptionData {
    /// New required option.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: OptionKind,
    ) -> Result<Self, CommandDataError> {
        let name = name.into();
        let description = description.into();
        check_name(&name, "option name")?;
        check_description(&description, "option description")?;
        Ok(Self {
            name,
            description,
            kind,
            required: true,
            name_localizations: BTreeMap::new(),
            description_localizations: BTreeMap::new(),
            autocomplete: false,
            choices: Vec::new(),
            options: Vec::new(),
            channel_kinds: BTreeSet::new(),
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
        })
    }

    /// Mark the option required or optional. Subcommands cannot be optional.
    pub fn required(mut self, required: bool) -> Result<Self, CommandDataError> {
        if !required && self.kind.is_subcommand() {
            return Err(CommandDataError::OptionalSubcommand(self.kind));
        }
        self.required = required;
        Ok(self)
    }

    /// Localized names, held to the same rules as the name itself.
    pub fn with_name_localizations<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = (Locale, S)>,
    ) -> Result<Self, CommandDataError> {
        self.name_localizations = localized(names, |name| check_name(name, "option name"))?;
        Ok(self)
    }

    /// Localized descriptions.
    pub fn with_description_localizations<S: Into<String>>(
        mut self,
        descriptions: impl IntoIterator<Item = (Locale, S)>,
    ) -> Result<Self, CommandDataError> {
        self.description_localizations = localized(descriptions, |description| {
            check_description(description, "option description")
        })?;
        Ok(self)
    }

    /// Fixed choices. Their values must match the option kind.
    pub fn with_choices(
        mut self,
        choices: impl IntoIterator<Item = OptionChoice>,
    ) -> Result<Self, CommandDataError> {
        if !self.kind.can_have_choices() {
            return Err(CommandDataError::NotApplicable {
                kind: self.kind,
                what: "choices",
            });
        }
        if self.autocomplete {
            return Err(CommandDataError::ChoicesWithAutocomplete);
        }
        let choices: Vec<OptionChoice> = choices.into_iter().collect();
        check_choices(&choices)?;
        if let Some(choice) = choices.iter().find(|choice| choice.value.kind() != self.kind) {
            return Err(CommandDataError::ChoiceKindMismatch {
                kind: self.kind,
                choice: choice.value.kind(),
            });
        }
        self.choices = choices;
        Ok(self)
    }

    /// Ask the platform for autocomplete interactions while the user types.
    pub fn autocomplete(mut self) -> Result<Self, CommandDataError> {
        if !self.kind.can_have_choices() {
            return Err(CommandDataError::NotApplicable {
                kind: self.kind,
                what: "autocomplete",
            });
        }
        if !self.choices.is_empty() {
            return Err(CommandDataError::ChoicesWithAutocomplete);
        }
        self.autocomplete = true;
        Ok(self)
    }

    /// Length limits of a string option.
    pub fn with_length_range(
        mut self,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<Self, CommandDataError> {
        if self.kind != OptionKind::String {
            return Err(CommandDataError::NotApplicable {
                kind: self.kind,
                what: "length range",
            });
        }
        if min.is_some_and(|min| min > MAX_STRING_OPTION_LENGTH) {
            return Err(CommandDataError::OutOfRange {
                field: "minimum length",
            });
        }
        if max.is_some_and(|max| max == 0 || max > MAX_STRING_OPTION_LENGTH) {
            return Err(CommandDataError::OutOfRange {
                field: "maximum length",
            });
        }
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(CommandDataError::InvertedBounds { field: "length" });
            }
        }
        self.min_length = min;
        self.max_length = max;
        Ok(self)
    }

    /// Value limits of an integer option.
    pub fn with_integer_range(
        mut self,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Result<Self, CommandDataError> {
        if self.kind != OptionKind::Integer {
            return Err(CommandDataError::NotApplicable {
                kind: self.kind,
                what: "integer range",
            });
        }
        let safe = MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER;
        if min.is_some_and(|min| !safe.contains(&min)) {
            return Err(CommandDataError::OutOfRange {
                field: "minimum value",
            });
        }
        if max.is_some_and(|max| !safe.contains(&max)) {
            return Err(CommandDataError::OutOfRange {
                field: "maximum value",
            });
        }
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(CommandDataError::InvertedBounds { field: "value" });
            }
        }
        self.min_value = min.map(ValueBound::Integer);
        self.max_value = max.map(ValueBound::Integer);
        Ok(self)
    }

    /// Value limits of a number option.
    pub fn with_number_range(
        mut self,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Self, CommandDataError> {
        if self.kind != OptionKind::Number {
            return Err(CommandDataError::NotApplicable {
                kind: self.kind,
                what: "number range",
            });
        }
        let safe = MIN_SAFE_NUMBER..=MAX_SAFE_NUMBER;
        if min.is_some_and(|min| !safe.contains(&min)) {
            return Err(CommandDataError::OutOfRange {
                field: "minimum value",
            });
        }
        if max.is_some_and(|max| !safe.contains(&max)) {
            return Err(CommandDataError::OutOfRange {
                field: "maximum value",
            });
        }
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(CommandDataError::InvertedBounds { field: "value" });
            }
        }
        self.min_value = min.map(ValueBound::Number);
        self.max_value = max.map(ValueBound::Number);
        Ok(self)
    }

    /// Channel kinds a channel option accepts.
    pub fn with_channel_kinds(
        mut self,
        kinds: impl IntoIterator<Item = ChannelKind>,
    ) -> Result<Self, CommandDataError> {
        if self.kind != OptionKind::Channel {
            return Err(CommandDataError::NotApplicable {
                kind: self.kind,
                what: "channel kinds",
            });
        }
        let kinds: BTreeSet<ChannelKind> = kinds.into_iter().collect();
        if kinds.contains(&ChannelKind::Unknown) {
            return Err(CommandDataError::UnknownChannelKind);
        }
        self.channel_kinds = kinds;
        Ok(self)
    }

    /// Nest `option` under this subcommand or group.
    ///
    /// Groups hold only subcommands; subcommands hold only value options.
    pub fn with_option(mut self, option: CommandOptionData) -> Result<Self, CommandDataError> {
        let allowed = match self.kind {
            OptionKind::SubCommandGroup => option.kind == OptionKind::SubCommand,
            OptionKind::SubCommand => !option.kind.is_subcommand(),
            kind => {
                return Err(CommandDataError::NotApplicable {
                    kind,
                    what: "nested options",
                })
            }
        };
        if !allowed {
            return Err(CommandDataError::InvalidNesting {
                parent: self.kind,
                child: option.kind,
            });
        }
        push_option(&mut self.options, option)?;
        Ok(self)
    }

    /// Option name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Option description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Option kind.
    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    /// Whether the user must supply this option. Always true for subcommands.
    pub fn is_required(&self) -> bool {
        self.required || self.kind.is_subcommand()
    }

    /// Whether the option asks for autocomplete.
    pub fn is_autocomplete(&self) -> bool {
        self.autocomplete
    }

    /// Localized names.
    pub fn name_localizations(&self) -> &BTreeMap<Locale, String> {
        &self.name_localizations
    }

    /// Localized descriptions.
    pub fn description_localizations(&self) -> &BTreeMap<Locale, String> {
        &self.description_localizations
    }

    /// Fixed choices.
    pub fn choices(&self) -> &[OptionChoice] {
        &self.choices
    }

    /// Nested options.
    pub fn options(&self) -> &[CommandOptionData] {
        &self.options
    }

    /// Accepted channel kinds, empty for any.
    pub fn channel_kinds(&self) -> &BTreeSet<ChannelKind> {
        &self.channel_kinds
    }

    /// Lower and upper value bounds.
    pub fn value_range(&self) -> (Option<ValueBound>, Option<ValueBound>) {
        (self.min_value, self.max_value)
    }

    /// Lower and upper length bounds.
    pub fn length_range(&self) -> (Option<usize>, Option<usize>) {
        (self.min_length, self.max_length)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Declaration of a slash command, as submitted for registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandData {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    name_localizations: BTreeMap<Locale, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    description_localizations: BTreeMap<Locale, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<CommandOptionData>,
    enabled_in_dms: bool,
    nsfw: bool,
}

impl CommandData {
    /// New command with no options, usable in direct messages.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, CommandDataError> {
        let name = name.into();
        let description = description.into();
        check_name(&name, "command name")?;
        check_description(&description, "command description")?;
        Ok(Self {
            name,
            description,
            name_localizations: BTreeMap::new(),
            description_localizations: BTreeMap::new(),
            options: Vec::new(),
            enabled_in_dms: true,
            nsfw: false,
        })
    }

    /// Localized names, held to the same rules as the name itself.
    pub fn with_name_localizations<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = (Locale, S)>,
    ) -> Result<Self, CommandDataError> {
        self.name_localizations = localized(names, |name| check_name(name, "command name"))?;
        Ok(self)
    }

    /// Localized descriptions.
    pub fn with_description_localizations<S: Into<String>>(
        mut self,
        descriptions: impl IntoIterator<Item = (Locale, S)>,
    ) -> Result<Self, CommandDataError> {
        self.description_localizations = localized(descriptions, |description| {
            check_description(description, "command description")
        })?;
        Ok(self)
    }

    /// Append a top-level option.
    pub fn with_option(mut self, option: CommandOptionData) -> Result<Self, CommandDataError> {
        push_option(&mut self.options, option)?;
        Ok(self)
    }

    /// Whether the command can be used in direct messages.
    pub fn enabled_in_dms(mut self, enabled: bool) -> Self {
        self.enabled_in_dms = enabled;
        self
    }

    /// Restrict the command to age-gated channels.
    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    /// Command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Localized names.
    pub fn name_localizations(&self) -> &BTreeMap<Locale, String> {
        &self.name_localizations
    }

    /// Localized descriptions.
    pub fn description_localizations(&self) -> &BTreeMap<Locale, String> {
        &self.description_localizations
    }

    /// Top-level options.
    pub fn options(&self) -> &[CommandOptionData] {
        &self.options
    }

    /// Whether the command can be used in direct messages.
    pub fn is_enabled_in_dms(&self) -> bool {
        self.enabled_in_dms
    }

    /// Whether the command is age-gated.
    pub fn is_nsfw(&self) -> bool {
        self.nsfw
    }
}
