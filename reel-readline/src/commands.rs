//! The set of named, bindable editing commands.

/// A named editing command that can be bound to a key sequence.
///
/// Names follow the traditional readline spelling (`beginning-of-line`,
/// `reverse-search-history`, ...) via kebab-case serialization.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    strum_macros::EnumString,
    strum_macros::Display,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[expect(missing_docs)]
pub enum Command {
    Abort,
    AcceptLine,
    BackwardChar,
    BackwardDeleteChar,
    BackwardKillLine,
    BackwardKillWord,
    BackwardWord,
    BeginningOfHistory,
    BeginningOfLine,
    BracketedPasteBegin,
    CapitalizeWord,
    ClearDisplay,
    ClearScreen,
    CopyRegionAsKill,
    DeleteChar,
    DeleteHorizontalSpace,
    DigitArgument,
    DoLowercaseVersion,
    DowncaseWord,
    DumpFunctions,
    DumpMacros,
    DumpVariables,
    EmacsEditingMode,
    EndOfHistory,
    EndOfLine,
    ExchangePointAndMark,
    ForwardBackwardDeleteChar,
    ForwardChar,
    ForwardSearchHistory,
    ForwardWord,
    HistoryExpandLine,
    HistorySearchBackward,
    HistorySearchForward,
    InsertComment,
    KillLine,
    KillRegion,
    KillWholeLine,
    KillWord,
    NextHistory,
    NonIncrementalForwardSearchHistory,
    NonIncrementalReverseSearchHistory,
    OperateAndGetNext,
    PreviousHistory,
    QuotedInsert,
    ReReadInitFile,
    RedrawCurrentLine,
    ReverseSearchHistory,
    RevertLine,
    SelfInsert,
    SetMark,
    TabInsert,
    TransposeChars,
    TransposeWords,
    Undo,
    UnixLineDiscard,
    UnixWordRubout,
    UniversalArgument,
    UpcaseWord,
    ViEditingMode,
    ViInsertionMode,
    ViMovementMode,
    Yank,
    YankLastArg,
    YankNthArg,
    YankPop,
}

impl Command {
    /// Whether this command inserts its invoking key into the line.
    pub const fn is_insert(self) -> bool {
        matches!(self, Self::SelfInsert)
    }

    /// Whether this command accumulates a numeric argument (and so should
    /// not become the recorded "last command").
    pub const fn is_arg_accumulator(self) -> bool {
        matches!(self, Self::DigitArgument | Self::UniversalArgument)
    }

    /// Whether this command kills text into the kill ring.
    pub const fn is_kill(self) -> bool {
        matches!(
            self,
            Self::KillLine
                | Self::BackwardKillLine
                | Self::KillWholeLine
                | Self::KillWord
                | Self::BackwardKillWord
                | Self::UnixWordRubout
                | Self::UnixLineDiscard
                | Self::KillRegion
                | Self::CopyRegionAsKill
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn names_round_trip() {
        assert_eq!(Command::BeginningOfLine.to_string(), "beginning-of-line");
        assert_eq!(
            Command::from_str("reverse-search-history").unwrap(),
            Command::ReverseSearchHistory
        );
        assert!(Command::from_str("no-such-command").is_err());
    }
}
