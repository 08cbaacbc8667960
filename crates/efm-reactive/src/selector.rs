//! CSS selectors for render targets and event routing, parsed and matched by
//! the `selectors` crate.
//!
//! Pseudo classes outside the structural ones the crate handles itself
//! (`:first-child`, `:not(..)`, `:root` and friends) are rejected, so a typo in
//! a target selector surfaces as an error instead of matching too much.

use std::fmt;

use cssparser::{CssStringWriter, Parser as CssParser, ParserInput, ToCss, serialize_identifier};
use selectors::context::QuirksMode;
use selectors::matching::{
    IgnoreNthChildForInvalidation, MatchingContext, MatchingMode, NeedsSelectorFlags,
    matches_selector_list,
};
use selectors::parser::{
    ParseRelative, Parser as SelParser, SelectorImpl, SelectorList, SelectorParseErrorKind,
};
use selectors::NthIndexCache;

use crate::dom::ElementView;
use crate::error::{ReactiveError, Result};

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Ident(pub String);

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Ident {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for Ident {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}

impl ToCss for Ident {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        serialize_identifier(&self.0, dest)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct AttrValue(pub String);

impl AsRef<str> for AttrValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for AttrValue {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}

impl ToCss for AttrValue {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        use std::fmt::Write;
        write!(CssStringWriter::new(dest), "{}", &self.0)
    }
}

/// Selector vocabulary of the document: plain HTML names, no pseudo elements.
#[derive(Clone, Debug)]
pub enum DomSelectors {}

impl SelectorImpl for DomSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = AttrValue;
    type Identifier = Ident;
    type LocalName = Ident;
    type NamespaceUrl = Ident;
    type NamespacePrefix = Ident;
    type BorrowedNamespaceUrl = str;
    type BorrowedLocalName = str;
    type NonTSPseudoClass = NoPseudo;
    type PseudoElement = NoPseudo;
}

/// Uninhabited, so user-action pseudo classes and pseudo elements fail to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoPseudo {}

impl ToCss for NoPseudo {
    fn to_css<W>(&self, _dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match *self {}
    }
}

impl selectors::parser::NonTSPseudoClass for NoPseudo {
    type Impl = DomSelectors;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl selectors::parser::PseudoElement for NoPseudo {
    type Impl = DomSelectors;

    fn accepts_state_pseudo_classes(&self) -> bool {
        match *self {}
    }

    fn valid_after_slotted(&self) -> bool {
        match *self {}
    }
}

struct DomParser;

impl<'i> SelParser<'i> for DomParser {
    type Impl = DomSelectors;
    type Error = SelectorParseErrorKind<'i>;
}

/// A parsed selector list, remembering its source text.
#[derive(Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<DomSelectors>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        let mut input = ParserInput::new(source);
        let mut parser = CssParser::new(&mut input);
        let list = SelectorList::parse(&DomParser, &mut parser, ParseRelative::No)
            .map_err(|_| ReactiveError::InvalidSelector(source.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, element: &ElementView<'_>) -> bool {
        let mut cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        matches_selector_list(&self.list, element, &mut context)
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Selector {}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
