use core::fmt;

use memchr::{memchr, memchr_iter};

/// A record terminator.
///
/// Use this to specify which line endings end a record while parsing. The
/// default is `Universal`, which treats `\r`, `\n` or `\r\n` as a single
/// record terminator.
///
/// Terminators are only recognized outside of quoted fields. Inside quotes,
/// every byte is data and is never rewritten.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminator {
    /// Parses `\r`, `\n` or `\r\n` as a single record terminator.
    Universal,
    /// Parses only `\n` as a record terminator. A `\r` is ordinary data.
    LF,
    /// Parses only `\r` as a record terminator. A `\n` is ordinary data.
    CR,
    /// Parses only the pair `\r\n` as a record terminator. A lone `\r` or
    /// `\n` is ordinary data.
    CRLF,
}

impl Terminator {
    /// Whether `b` ends a record by itself.
    #[inline]
    fn ends_record(&self, b: u8) -> bool {
        match *self {
            Terminator::Universal => b == b'\r' || b == b'\n',
            Terminator::LF => b == b'\n',
            Terminator::CR => b == b'\r',
            Terminator::CRLF => false,
        }
    }

    /// Whether `b` may be the first half of a `\r\n` terminator that must
    /// be confirmed by the byte after it.
    #[inline]
    fn starts_pair(&self, b: u8) -> bool {
        *self == Terminator::CRLF && b == b'\r'
    }
}

impl Default for Terminator {
    fn default() -> Terminator {
        Terminator::Universal
    }
}

/// How to treat input that breaks the quoting rules.
///
/// There are three ways to break them: text after the closing quote of a
/// quoted field (`"a"b`), a quote inside an unquoted field (`a"b`) and a
/// quoted field that is still open at the end of the stream (`"ab`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Quoting {
    /// Always find *a* parse.
    ///
    /// Text after a closing quote is appended to the field as if the field
    /// continued unquoted, a quote inside an unquoted field is kept as
    /// data and an unclosed quoted field ends at the end of the stream.
    ///
    /// This is the default.
    Lenient,
    /// Report each violation as `ReadRecordResult::Malformed`.
    Strict,
}

impl Default for Quoting {
    fn default() -> Quoting {
        Quoting::Lenient
    }
}

/// A violation of the quoting rules, reported in `Quoting::Strict` mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Malformed {
    /// A byte other than a quote, delimiter or terminator followed the
    /// closing quote of a quoted field.
    TextAfterQuote,
    /// A quote appeared inside an unquoted field.
    QuoteInUnquotedField,
    /// The stream ended inside a quoted field.
    UnclosedQuote,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Malformed::TextAfterQuote => {
                write!(f, "found text after the closing quote of a field")
            }
            Malformed::QuoteInUnquotedField => {
                write!(f, "found a quote inside an unquoted field")
            }
            Malformed::UnclosedQuote => {
                write!(f, "reached the end of input inside a quoted field")
            }
        }
    }
}

/// A pull based CSV row tokenizer.
///
/// This reader parses CSV data using a finite state machine. Callers feed
/// it input incrementally using the `read_record` method.
///
/// Here are the rules it follows:
///
/// * A field is either bare (no `,`, `"` or terminator) or quoted. Inside
///   quotes, `""` is a literal quote and everything else, including
///   delimiters and line endings, is data.
/// * `\r`, `\n` and `\r\n` each end one record (see `Terminator` for the
///   other modes). A `\r\n` pair never ends two records, even when the
///   pair is split across two calls.
/// * An empty line is a record with a single empty field.
/// * The end of the stream ends the last record, unless nothing at all
///   followed the last terminator.
/// * Records are permitted to be of varying length.
#[derive(Clone, Debug)]
pub struct Reader {
    /// The current NFA state.
    nfa_state: NfaState,
    /// The terminator that separates records.
    term: Terminator,
    /// Whether quoting violations are reported.
    quoting: Quoting,
    /// The current line number.
    line: u64,
    /// The current position in the output buffer when reading a record.
    output_pos: usize,
}

impl Default for Reader {
    fn default() -> Reader {
        Reader {
            nfa_state: NfaState::StartRecord,
            term: Terminator::default(),
            quoting: Quoting::default(),
            line: 1,
            output_pos: 0,
        }
    }
}

/// Builds a CSV tokenizer with various configuration knobs.
///
/// Once a `Reader` is built, its configuration cannot be changed.
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    rdr: Reader,
}

impl ReaderBuilder {
    /// Create a new builder.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV tokenizer from this configuration.
    pub fn build(&self) -> Reader {
        let mut rdr = self.rdr.clone();
        rdr.reset();
        rdr
    }

    /// The record terminator to use when parsing CSV.
    ///
    /// The default is `Terminator::Universal`, which treats any occurrence
    /// of `\r`, `\n` or `\r\n` as a single record terminator.
    pub fn terminator(&mut self, term: Terminator) -> &mut ReaderBuilder {
        self.rdr.term = term;
        self
    }

    /// How to treat input that breaks the quoting rules.
    ///
    /// The default is `Quoting::Lenient`.
    pub fn quoting(&mut self, quoting: Quoting) -> &mut ReaderBuilder {
        self.rdr.quoting = quoting;
        self
    }
}

/// The result of parsing at most one record from CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadRecordResult {
    /// The caller provided input was exhausted before the end of a record
    /// was found.
    InputEmpty,
    /// The caller provided output buffer was filled before an entire field
    /// could be written to it.
    OutputFull,
    /// The caller provided output buffer of field end positions was filled
    /// before the next field could be parsed.
    OutputEndsFull,
    /// The end of a record was found.
    Record,
    /// All CSV data has been read.
    ///
    /// This state can only be returned when an empty input buffer is
    /// provided by the caller.
    End,
    /// The input broke the quoting rules. Only reported in
    /// `Quoting::Strict` mode.
    ///
    /// The parser has already taken the transition lenient mode would
    /// take, so the caller can keep reading to skip the rest of the record.
    Malformed(Malformed),
}

impl ReadRecordResult {
    fn is_record(&self) -> bool {
        *self == ReadRecordResult::Record
    }

    fn from_nfa(
        state: NfaState,
        inpdone: bool,
        outdone: bool,
        endsdone: bool,
    ) -> ReadRecordResult {
        match state {
            NfaState::End => ReadRecordResult::End,
            NfaState::EndRecord => ReadRecordResult::Record,
            _ => {
                if !inpdone && outdone {
                    ReadRecordResult::OutputFull
                } else if !inpdone && endsdone {
                    ReadRecordResult::OutputEndsFull
                } else {
                    ReadRecordResult::InputEmpty
                }
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum NfaState {
    StartRecord,
    StartField,
    InField,
    InQuotedField,
    InClosingQuote,
    InPendingCR,
    InClosingQuotePendingCR,
    EndFieldDelim,
    EndFieldTerm,
    InRecordTerm,
    CR,
    EndRecord,
    End,
}

impl NfaState {
    fn is_field_final(&self) -> bool {
        match *self {
            NfaState::EndFieldDelim | NfaState::EndFieldTerm => true,
            _ => false,
        }
    }
}

impl Reader {
    /// Create a new CSV reader with a default parser configuration.
    pub fn new() -> Reader {
        ReaderBuilder::new().build()
    }

    /// Reset the parser such that it behaves as if it had never been used.
    pub fn reset(&mut self) {
        self.nfa_state = NfaState::StartRecord;
        self.line = 1;
        self.output_pos = 0;
    }

    /// Return the current line number as measured by the number of
    /// occurrences of `\n`.
    ///
    /// Line numbers start at `1` and are reset when `reset` is called.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Parse a single CSV record in `input` and copy field data to
    /// `output`.
    ///
    /// Field data copied to `output` has its quotes removed and doubled
    /// quotes unescaped. The end position of each field (relative to the
    /// start of the record) is written to `ends`.
    ///
    /// The returned counts are the number of bytes read from `input`,
    /// written to `output` and written to `ends`, respectively.
    ///
    /// # Termination
    ///
    /// An empty `input` buffer signals that there is no CSV data left to
    /// read. The caller should keep calling `read_record` with an empty
    /// input buffer until `ReadRecordResult::End` is returned.
    ///
    /// Note that a `\r` at the very end of `input` never produces
    /// `ReadRecordResult::Record` on its own: the record is only complete
    /// once the next byte (or the end of the stream) shows whether the `\r`
    /// was followed by `\n`.
    pub fn read_record(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        if input.is_empty() {
            return self.read_record_final(output, ends);
        }
        if output.is_empty() {
            return (ReadRecordResult::OutputFull, 0, 0, 0);
        }
        if ends.is_empty() {
            return (ReadRecordResult::OutputEndsFull, 0, 0, 0);
        }
        let (mut nin, mut nout, mut nend) = (0, 0, 0);
        let mut state = self.nfa_state;
        let mut malformed = None;
        while nin < input.len() && nout < output.len() && nend < ends.len() {
            if state == NfaState::InQuotedField {
                let (i, o) =
                    self.copy_quoted(&input[nin..], &mut output[nout..]);
                nin += i;
                nout += o;
                if nin >= input.len() || nout >= output.len() {
                    break;
                }
            }
            let c = input[nin];
            if self.quoting == Quoting::Strict {
                malformed = self.reject(state, c);
            }
            let (s, i, o) = self.transition_nfa(state, c);
            if let Some(b) = o {
                output[nout] = b;
                nout += 1;
            }
            if i {
                self.line += (c == b'\n') as u64;
                nin += 1;
            }
            state = s;
            if state.is_field_final() {
                ends[nend] = self.output_pos + nout;
                nend += 1;
            } else if state == NfaState::EndRecord {
                break;
            }
            if malformed.is_some() {
                break;
            }
        }
        let res = match malformed {
            Some(kind) => ReadRecordResult::Malformed(kind),
            None => ReadRecordResult::from_nfa(
                state,
                nin >= input.len(),
                nout >= output.len(),
                nend >= ends.len(),
            ),
        };
        self.nfa_state = state;
        self.output_pos =
            if res.is_record() { 0 } else { self.output_pos + nout };
        (res, nin, nout, nend)
    }

    /// Handle the end of the stream.
    fn read_record_final(
        &mut self,
        output: &mut [u8],
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        let (state, closes_field, replay_cr) =
            self.transition_final_nfa(self.nfa_state);
        if replay_cr && output.is_empty() {
            return (ReadRecordResult::OutputFull, 0, 0, 0);
        }
        if closes_field && ends.is_empty() {
            return (ReadRecordResult::OutputEndsFull, 0, 0, 0);
        }
        let malformed = if self.quoting == Quoting::Strict {
            self.reject_final(self.nfa_state)
        } else {
            None
        };
        let mut nout = 0;
        if replay_cr {
            output[0] = b'\r';
            nout = 1;
        }
        let mut nend = 0;
        if closes_field {
            ends[0] = self.output_pos + nout;
            nend = 1;
        }
        self.nfa_state = state;
        self.output_pos = 0;
        let res = match malformed {
            Some(kind) => ReadRecordResult::Malformed(kind),
            None => ReadRecordResult::from_nfa(state, true, false, false),
        };
        (res, 0, nout, nend)
    }

    /// Copy a run of quoted field data up to (but not including) the next
    /// quote in bulk.
    #[inline(always)]
    fn copy_quoted(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (usize, usize) {
        let avail = core::cmp::min(input.len(), output.len());
        let n = memchr(b'"', &input[..avail]).unwrap_or(avail);
        output[..n].copy_from_slice(&input[..n]);
        self.line += memchr_iter(b'\n', &input[..n]).count() as u64;
        (n, n)
    }

    /// Returns the transition to take at the end of the stream, whether it
    /// closes a field and whether a pending `\r` must be emitted as data.
    #[inline(always)]
    fn transition_final_nfa(&self, state: NfaState) -> (NfaState, bool, bool) {
        use self::NfaState::*;
        match state {
            End | StartRecord | EndRecord => (End, false, false),
            EndFieldTerm | InRecordTerm | CR => (EndRecord, false, false),
            InPendingCR | InClosingQuotePendingCR => (EndRecord, true, true),
            StartField | EndFieldDelim | InField | InQuotedField
            | InClosingQuote => (EndRecord, true, false),
        }
    }

    /// Returns the quoting violation, if any, of seeing `c` in `state`.
    ///
    /// A violation never changes the transition taken. It only changes what
    /// is reported to the caller.
    #[inline(always)]
    fn reject(&self, state: NfaState, c: u8) -> Option<Malformed> {
        match state {
            NfaState::InField if c == b'"' => {
                Some(Malformed::QuoteInUnquotedField)
            }
            NfaState::InClosingQuote
                if c != b'"'
                    && c != b','
                    && !self.term.ends_record(c)
                    && !self.term.starts_pair(c) =>
            {
                Some(Malformed::TextAfterQuote)
            }
            NfaState::InClosingQuotePendingCR if c != b'\n' => {
                Some(Malformed::TextAfterQuote)
            }
            _ => None,
        }
    }

    #[inline(always)]
    fn reject_final(&self, state: NfaState) -> Option<Malformed> {
        match state {
            NfaState::InQuotedField => Some(Malformed::UnclosedQuote),
            NfaState::InClosingQuotePendingCR => Some(Malformed::TextAfterQuote),
            _ => None,
        }
    }

    /// Compute the next state given the current state and a byte of input.
    ///
    /// Returns the next state, whether `c` was consumed and the byte to
    /// append to the current field, if any.
    #[inline(always)]
    fn transition_nfa(
        &self,
        state: NfaState,
        c: u8,
    ) -> (NfaState, bool, Option<u8>) {
        use self::NfaState::*;
        match state {
            End => (End, false, None),
            StartRecord => (StartField, false, None),
            EndRecord => (StartRecord, false, None),
            StartField => {
                if c == b'"' {
                    (InQuotedField, true, None)
                } else if c == b',' {
                    (EndFieldDelim, true, None)
                } else if self.term.ends_record(c) {
                    (EndFieldTerm, false, None)
                } else if self.term.starts_pair(c) {
                    (InPendingCR, true, None)
                } else {
                    (InField, true, Some(c))
                }
            }
            EndFieldDelim => (StartField, false, None),
            EndFieldTerm => (InRecordTerm, false, None),
            InField => {
                if c == b',' {
                    (EndFieldDelim, true, None)
                } else if self.term.ends_record(c) {
                    (EndFieldTerm, false, None)
                } else if self.term.starts_pair(c) {
                    (InPendingCR, true, None)
                } else {
                    (InField, true, Some(c))
                }
            }
            InQuotedField => {
                if c == b'"' {
                    (InClosingQuote, true, None)
                } else {
                    (InQuotedField, true, Some(c))
                }
            }
            InClosingQuote => {
                if c == b'"' {
                    (InQuotedField, true, Some(c))
                } else if c == b',' {
                    (EndFieldDelim, true, None)
                } else if self.term.ends_record(c) {
                    (EndFieldTerm, false, None)
                } else if self.term.starts_pair(c) {
                    (InClosingQuotePendingCR, true, None)
                } else {
                    (InField, true, Some(c))
                }
            }
            InPendingCR | InClosingQuotePendingCR => {
                if c == b'\n' {
                    (EndFieldTerm, false, None)
                } else {
                    // Not a terminator after all, so the `\r` is data.
                    (InField, false, Some(b'\r'))
                }
            }
            InRecordTerm => {
                if self.term == Terminator::Universal && c == b'\r' {
                    (CR, true, None)
                } else {
                    (EndRecord, true, None)
                }
            }
            CR => {
                if c == b'\n' {
                    (EndRecord, true, None)
                } else {
                    (EndRecord, false, None)
                }
            }
        }
    }
}
