//! Elements, character data and tag omission.
//!
//! [§ 3 Logical Structures](https://www.w3.org/TR/xml/#sec-logical-struct)
//!
//! With tag omission enabled every start tag, and every piece of data the
//! current element refuses, is first offered to the builder through
//! [`ElementBuilder::accept_child`]. The answer decides whether it goes
//! into the current element, into an implied element opened around it, or
//! whether the current element ends and the offer moves to its parent.

use marten_common::warning::warn_once;

use super::core::{OpenElement, Pending, ReferenceMode, StartTag, XmlParser};
use crate::builder::{ChildClass, ContentKind, DataOutcome, ElementBuilder};
use crate::chars::{is_char, is_name_char, is_name_start_char, is_s, strip_leading_s};
use crate::dtd::ContentCategory;
use crate::entity::EntityId;
use crate::error::Result;
use crate::model::ModelCursor;

/// Something that arrived in content and needs a place in the tree.
pub(super) enum Arrival {
    Tag(StartTag),
    /// Character data, or `None` when only asking whether data would be
    /// taken before reading a reference or CDATA section.
    Data(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Placement {
    /// Placed, possibly inside implied elements. A placed start tag leaves
    /// its element open.
    Placed,
    /// The current element takes data as it is.
    AcceptedHere,
    /// The current element is finished; the arrival is pending.
    ContentEnded,
}

enum ContentEnd {
    /// `</` was read; the `<` came from this entity.
    EndTag(EntityId),
    /// The builder ended the element.
    Omitted,
    /// End of input.
    Ended,
}

impl<B: ElementBuilder> XmlParser<'_, B> {
    fn context(&self) -> B::Node {
        self.open
            .last()
            .map_or_else(|| self.builder.document(), |open| open.node)
    }

    pub(super) fn open_name(&self) -> String {
        self.open
            .last()
            .and_then(|open| self.builder.element_name(open.node))
            .unwrap_or_default()
    }

    fn negotiate(
        &mut self,
        context: B::Node,
        proposed: &ChildClass<B::Class>,
    ) -> Option<ChildClass<B::Class>> {
        if self.options.sgml_omittag {
            self.builder.accept_child(context, proposed)
        } else {
            Some(proposed.clone())
        }
    }

    /// Find a place for `arrival` starting at the current element.
    pub(super) fn place(&mut self, arrival: Arrival) -> Result<Placement> {
        let context = self.context();
        match arrival {
            Arrival::Tag(tag) => {
                let class = self.builder.element_class(context, &tag.name);
                let proposed = ChildClass::Element(class.clone());
                match self.negotiate(context, &proposed) {
                    None => {
                        self.pending = Some(Pending::Tag(tag));
                        Ok(Placement::ContentEnded)
                    }
                    Some(ChildClass::Element(implied)) if implied != class => {
                        self.pending = Some(Pending::Tag(tag));
                        self.implied_element(context, implied)?;
                        Ok(Placement::Placed)
                    }
                    Some(_) => {
                        self.open_element(context, class, Some(tag))?;
                        Ok(Placement::Placed)
                    }
                }
            }
            Arrival::Data(data) => match self.negotiate(context, &ChildClass::Data) {
                None => {
                    self.pending = data.map(Pending::Data);
                    Ok(Placement::ContentEnded)
                }
                Some(ChildClass::Data) if data.is_none() => Ok(Placement::AcceptedHere),
                Some(ChildClass::Data) => {
                    let name = self.open_name();
                    self.validity_error(format!("character data not allowed in <{name}>"))?;
                    Ok(Placement::Placed)
                }
                Some(ChildClass::Element(implied)) => {
                    self.pending = data.map(Pending::Data);
                    self.implied_element(context, implied)?;
                    Ok(Placement::Placed)
                }
            },
        }
    }

    /// Open an element whose start tag was omitted.
    fn implied_element(&mut self, context: B::Node, class: B::Class) -> Result<()> {
        let progress = self.progress;
        if self
            .open
            .iter()
            .any(|open| open.class == class && open.implied_at == Some(progress))
        {
            return self.fatal_error(format!(
                "tag omission made no progress: {class:?} implied inside itself"
            ));
        }
        self.open_element(context, class, None)
    }

    /// [39] element ::= EmptyElemTag | STag content ETag
    ///
    /// Creates the node, sets its attributes and pushes it on the open
    /// stack; its content is read by [`Self::element_content`]. `tag` is
    /// `None` for an implied element. Empty elements are closed at once.
    fn open_element(
        &mut self,
        context: B::Node,
        class: B::Class,
        tag: Option<StartTag>,
    ) -> Result<()> {
        if self.open.len() >= self.options.max_depth {
            return self.fatal_error(format!(
                "elements nested deeper than {}",
                self.options.max_depth
            ));
        }
        let mut tag = tag;
        if let Some(tag) = &tag {
            self.check_child_element(&tag.name)?;
        }
        let node = self
            .builder
            .create_child(context, &class, tag.as_ref().map(|tag| tag.name.as_str()));
        let implied_at = if tag.is_some() {
            self.progress += 1;
            None
        } else {
            Some(self.progress)
        };

        let (declared, cursor) = match tag.as_ref().filter(|_| self.validating()).and_then(|tag| {
            self.dtd
                .as_ref()
                .and_then(|dtd| dtd.element_type(&tag.name))
        }) {
            Some(element_type) => {
                let cursor = match (element_type.category, &element_type.automaton) {
                    (ContentCategory::Empty, _) => ModelCursor::EmptyOnly,
                    (_, Some(automaton)) => ModelCursor::new(automaton.clone()),
                    (_, None) => ModelCursor::Anything,
                };
                (
                    Some((element_type.category, element_type.external_declaration)),
                    Some(cursor),
                )
            }
            None => (None, None),
        };

        let attributes = tag
            .as_mut()
            .map(|tag| std::mem::take(&mut tag.attributes))
            .unwrap_or_default();
        let name = tag.as_ref().map(|tag| tag.name.clone());
        let empty = tag.as_ref().is_some_and(|tag| tag.empty);
        self.open.push(OpenElement {
            node,
            class: class.clone(),
            tag,
            declared,
            cursor,
            implied_at,
        });

        if let Some(name) = &name {
            for (attribute, value) in self.check_attributes(name, attributes)? {
                if let Err(e) = self.builder.set_attribute(node, &attribute, &value) {
                    self.validity_error(e.to_string())?;
                }
            }
        }

        let kind = if self.options.sgml_content {
            self.builder.content_kind(&class)
        } else {
            ContentKind::Mixed
        };
        if empty || kind == ContentKind::Empty {
            return self.close_element();
        }
        if kind == ContentKind::CData {
            self.raw_content()?;
        }
        Ok(())
    }

    fn close_element(&mut self) -> Result<()> {
        let Some(open) = self.open.pop() else {
            return Ok(());
        };
        let name = self.builder.element_name(open.node).unwrap_or_default();
        if let Some(cursor) = &open.cursor {
            if !cursor.end() {
                let expected = cursor.expected(&name).join(", ");
                self.validity_error(format!(
                    "Element Valid: content of <{name}> is incomplete, expected {expected}"
                ))?;
            }
        }
        if open.implied_at == Some(self.progress) {
            return self.fatal_error(format!(
                "tag omission made no progress: implied <{name}> closed empty"
            ));
        }
        self.builder.content_finished(open.node);
        Ok(())
    }

    /// Content and end tags of every open element above `depth`, read
    /// until all of them are closed. Nesting lives on the open stack, so
    /// the call stack stays flat however deep the document goes.
    pub(super) fn element_content(&mut self, depth: usize) -> Result<()> {
        while self.open.len() > depth {
            let closed = match self.parse_content()? {
                ContentEnd::Omitted => true,
                ContentEnd::Ended => {
                    if !self.options.sgml_omittag && !self.loose() {
                        let name = self.open_name();
                        return self.well_formedness_error(format!(
                            "[39] element: no end tag for <{name}>"
                        ));
                    }
                    true
                }
                ContentEnd::EndTag(entity) => self.end_tag(entity)?,
            };
            if closed {
                self.close_element()?;
            }
        }
        Ok(())
    }

    /// [42] ETag ::= '</' Name S? '>', after the `</`. Returns true if the
    /// current element is closed by it.
    fn end_tag(&mut self, entity: EntityId) -> Result<bool> {
        const PRODUCTION: &str = "[42] ETag";
        let name = match self.parse_name()? {
            Some(name) => self.fold_name(name),
            None if self.loose() => {
                self.skip_to_tag_end()?;
                warn_once("XML", "ignored end tag without a name");
                return Ok(false);
            }
            None => {
                let found = self.describe_current();
                return self.well_formedness_error(format!("{PRODUCTION}: expected Name, found {found}"));
            }
        };
        let _ = self.skip_plain_s()?;
        if self.loose() {
            self.skip_to_tag_end()?;
        } else {
            self.parse_required_literal(">", PRODUCTION)?;
        }

        let current = self.open_name();
        if self.names_match(&name, &current) {
            let started = self
                .open
                .last()
                .and_then(|open| open.tag.as_ref())
                .map(|tag| tag.entity);
            if !self.options.sgml_omittag && !self.loose() && started.is_some_and(|id| id != entity) {
                return self.well_formedness_error(format!(
                    "Parsed Entity: <{name}> and its end tag are in different entities"
                ));
            }
            return Ok(true);
        }
        if self.options.sgml_omittag {
            let closes_ancestor = self.open.iter().rev().skip(1).any(|open| {
                self.builder
                    .element_name(open.node)
                    .is_some_and(|ancestor| self.names_match(&ancestor, &name))
            });
            if closes_ancestor {
                self.entities.pushback(&format!("</{name}>"));
                return Ok(true);
            }
        }
        if self.loose() || self.options.sgml_omittag {
            warn_once("XML", &format!("ignored end tag </{name}> inside <{current}>"));
            return Ok(false);
        }
        self.well_formedness_error(format!(
            "Element Type Match: end tag </{name}> does not match <{current}>"
        ))
    }

    fn skip_to_tag_end(&mut self) -> Result<()> {
        while let Some(c) = self.current() {
            self.next_char()?;
            if c == '>' {
                break;
            }
        }
        Ok(())
    }

    /// In omit mode an element that does not take data directly must agree
    /// before a reference or CDATA section is read into it.
    fn needs_data_negotiation(&self) -> bool {
        self.options.sgml_omittag
            && self
                .open
                .last()
                .is_some_and(|open| !self.builder.is_mixed(open.node))
    }

    /// [43] content ::= CharData? ((element | Reference | CDSect | PI | Comment) CharData?)*
    fn parse_content(&mut self) -> Result<ContentEnd> {
        loop {
            match self.pending.take() {
                Some(Pending::Tag(tag)) => {
                    if self.place(Arrival::Tag(tag))? == Placement::ContentEnded {
                        return Ok(ContentEnd::Omitted);
                    }
                    continue;
                }
                Some(Pending::Data(text)) => {
                    if !self.deliver_data(text, false)? {
                        return Ok(ContentEnd::Omitted);
                    }
                    continue;
                }
                None => {}
            }
            let Some(c) = self.current() else {
                return Ok(ContentEnd::Ended);
            };
            match c {
                '<' => {
                    let entity = self.entities.current().id();
                    if self.parse_literal("</")? {
                        return Ok(ContentEnd::EndTag(entity));
                    }
                    if self.parse_literal("<!--")? {
                        let text = self.parse_comment_body()?;
                        self.check_no_content("a comment")?;
                        let context = self.context();
                        self.builder.comment(context, &text);
                        self.progress += 1;
                    } else if self.parse_literal("<![CDATA[")? {
                        if self.needs_data_negotiation() {
                            self.entities.pushback("<![CDATA[");
                            match self.place(Arrival::Data(None))? {
                                Placement::ContentEnded => return Ok(ContentEnd::Omitted),
                                Placement::Placed => continue,
                                Placement::AcceptedHere => {
                                    let _ = self.parse_literal("<![CDATA[")?;
                                }
                            }
                        }
                        let text = self.cdata_section()?;
                        if !self.deliver_data(text, true)? {
                            return Ok(ContentEnd::Omitted);
                        }
                    } else if self.parse_literal("<?")? {
                        let (target, data) = self.parse_pi_body()?;
                        self.check_no_content("a processing instruction")?;
                        let context = self.context();
                        self.builder.processing_instruction(context, &target, &data);
                        self.progress += 1;
                    } else {
                        self.next_char()?;
                        if self.current().is_some_and(is_name_start_char) {
                            let tag = self.parse_stag(entity)?;
                            if self.place(Arrival::Tag(tag))? == Placement::ContentEnded {
                                return Ok(ContentEnd::Omitted);
                            }
                        } else if self.loose() {
                            if !self.deliver_data("<".to_string(), false)? {
                                return Ok(ContentEnd::Omitted);
                            }
                        } else {
                            let found = self.describe_current();
                            return self.well_formedness_error(format!(
                                "[43] content: expected markup after '<', found {found}"
                            ));
                        }
                    }
                }
                '&' => {
                    if self.needs_data_negotiation() {
                        match self.place(Arrival::Data(None))? {
                            Placement::ContentEnded => return Ok(ContentEnd::Omitted),
                            Placement::Placed => continue,
                            Placement::AcceptedHere => {}
                        }
                    }
                    let text = self.parse_reference()?;
                    self.check_no_content("a reference")?;
                    if !text.is_empty() && !self.deliver_data(text, true)? {
                        return Ok(ContentEnd::Omitted);
                    }
                }
                _ => {
                    let text = self.char_data()?;
                    if !text.is_empty() && !self.deliver_data(text, false)? {
                        return Ok(ContentEnd::Omitted);
                    }
                }
            }
        }
    }

    /// [14] CharData, up to the next `<` or `&`.
    fn char_data(&mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(c) = self.current() {
            if c == '<' || c == '&' {
                break;
            }
            if c == ']' && self.parse_literal("]]>")? {
                if !self.loose() {
                    return self.well_formedness_error("[14] CharData: ']]>' outside a CDATA section");
                }
                text.push_str("]]>");
                continue;
            }
            match c {
                '\u{2028}' if self.options.unicode_compatibility => text.push('\n'),
                '\u{2029}' if self.options.unicode_compatibility => text.push(' '),
                c => {
                    self.check_char(c)?;
                    text.push(c);
                }
            }
            self.next_char()?;
        }
        Ok(text)
    }

    /// [2] Char, enforced unless checking is loose.
    pub(super) fn check_char(&self, c: char) -> Result<()> {
        if is_char(c) || self.loose() {
            return Ok(());
        }
        self.well_formedness_error(format!("[2] Char: {c:?} is not a legal character"))
    }

    /// [18] CDSect, after the `<![CDATA[`.
    fn cdata_section(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            if self.parse_literal("]]>")? {
                return Ok(text);
            }
            let Some(c) = self.current() else {
                return self.well_formedness_error("[18] CDSect: unterminated CDATA section");
            };
            self.check_char(c)?;
            text.push(c);
            self.next_char()?;
        }
    }

    /// Text of an SGML CDATA element: everything up to an end tag naming
    /// the element, which is left to be read.
    fn raw_content(&mut self) -> Result<()> {
        let name = self.open_name();
        let mut text = String::new();
        while let Some(c) = self.current() {
            if c == '<' && self.parse_literal("</")? {
                let mut candidate = String::new();
                while let Some(c) = self.current().filter(|&c| is_name_char(c)) {
                    candidate.push(c);
                    self.next_char()?;
                }
                if self.names_match(&candidate, &name) {
                    self.entities.pushback(&format!("</{candidate}"));
                    break;
                }
                text.push_str("</");
                text.push_str(&candidate);
                continue;
            }
            text.push(c);
            self.next_char()?;
        }
        if !text.is_empty() {
            let _ = self.deliver_data(text, false)?;
        }
        Ok(())
    }

    /// Hand data to the current element. Data refused in omit mode is
    /// offered for tag omission without its leading white space. Returns
    /// false if the current element ended instead.
    fn deliver_data(&mut self, text: String, cdata: bool) -> Result<bool> {
        let Some(node) = self.open.last().map(|open| open.node) else {
            return Ok(true);
        };
        if self.validating() {
            self.check_data(&text, cdata)?;
        }
        match self.builder.add_data(node, &text) {
            DataOutcome::Accepted => {
                self.progress += 1;
                Ok(true)
            }
            DataOutcome::Rejected if self.options.sgml_omittag => {
                let rest = strip_leading_s(&text);
                if rest.is_empty() {
                    return Ok(true);
                }
                let arrival = Arrival::Data(Some(rest.to_string()));
                Ok(self.place(arrival)? != Placement::ContentEnded)
            }
            DataOutcome::Rejected => {
                let name = self.open_name();
                self.validity_error(format!("character data not allowed in <{name}>"))?;
                Ok(true)
            }
        }
    }

    /// [VC: Element Valid] for character data in the current element.
    fn check_data(&mut self, text: &str, cdata: bool) -> Result<()> {
        let Some((category, external)) = self.open.last().and_then(|open| open.declared) else {
            return Ok(());
        };
        let name = self.open_name();
        match category {
            ContentCategory::Empty => self.validity_error(format!(
                "Element Valid: EMPTY element <{name}> has content"
            )),
            ContentCategory::ElementContent if cdata || !text.chars().all(is_s) => self
                .validity_error(format!(
                    "Element Valid: character data in element content of <{name}>"
                )),
            ContentCategory::ElementContent if external && self.declared_standalone() => self
                .validity_error(format!(
                    "Standalone Document Declaration: white space in externally declared element content of <{name}>"
                )),
            _ => Ok(()),
        }
    }

    fn check_no_content(&mut self, what: &str) -> Result<()> {
        let empty = self
            .open
            .last()
            .and_then(|open| open.declared)
            .is_some_and(|(category, _)| category == ContentCategory::Empty);
        if empty {
            let name = self.open_name();
            self.validity_error(format!("Element Valid: EMPTY element <{name}> contains {what}"))?;
        }
        Ok(())
    }

    /// [40] STag ::= '<' Name (S Attribute)* S? '>' and
    /// [44] EmptyElemTag ::= '<' Name (S Attribute)* S? '/>', positioned on
    /// the name. `entity` is where the `<` was read.
    pub(super) fn parse_stag(&mut self, entity: EntityId) -> Result<StartTag> {
        const PRODUCTION: &str = "[40] STag";
        let name = self.parse_required_name(PRODUCTION)?;
        let name = self.fold_name(name);
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut separated = false;
        loop {
            let space = self.skip_plain_s()? || std::mem::take(&mut separated);
            if self.parse_literal("/>")? {
                return Ok(StartTag {
                    name,
                    attributes,
                    empty: true,
                    entity,
                });
            }
            if self.at('>') {
                self.next_char()?;
                return Ok(StartTag {
                    name,
                    attributes,
                    empty: false,
                    entity,
                });
            }
            let Some(attribute) = self.parse_name()? else {
                if !self.loose() {
                    let found = self.describe_current();
                    return self.well_formedness_error(format!(
                        "{PRODUCTION}: expected attribute or '>', found {found}"
                    ));
                }
                if self.current().is_none() {
                    return Ok(StartTag {
                        name,
                        attributes,
                        empty: false,
                        entity,
                    });
                }
                warn_once("XML", &format!("skipped {} in <{name}>", self.describe_current()));
                self.next_char()?;
                continue;
            };
            if !space && !self.loose() {
                return self.well_formedness_error(format!(
                    "{PRODUCTION}: expected white space before attribute {attribute}"
                ));
            }
            let attribute = self.fold_name(attribute);
            let spaced = self.skip_plain_s()?;
            let value = if self.at('=') {
                self.next_char()?;
                let _ = self.skip_plain_s()?;
                self.parse_att_value()?
            } else if self.options.sgml_shorttag {
                separated = spaced;
                attribute.clone()
            } else {
                let found = self.describe_current();
                return self.well_formedness_error(format!(
                    "[41] Attribute: expected '=' after {attribute}, found {found}"
                ));
            };
            if let Some(existing) = attributes.iter_mut().find(|(name, _)| *name == attribute) {
                if !self.loose() {
                    return self.well_formedness_error(format!(
                        "Unique Att Spec: attribute {attribute} given twice in <{name}>"
                    ));
                }
                existing.1 = value;
            } else {
                attributes.push((attribute, value));
            }
        }
    }

    /// [10] AttValue, with references expanded and white space characters
    /// replaced by spaces. Unquoted values are accepted in loose mode.
    pub(super) fn parse_att_value(&mut self) -> Result<String> {
        let saved = self.ref_mode;
        if saved != ReferenceMode::AsAttributeValue {
            self.ref_mode = ReferenceMode::InAttributeValue;
        }
        let value = self.att_value_body();
        self.ref_mode = saved;
        value
    }

    fn att_value_body(&mut self) -> Result<String> {
        const PRODUCTION: &str = "[10] AttValue";
        let quote = match self.current() {
            Some(q @ ('"' | '\'')) => {
                self.next_char()?;
                Some(q)
            }
            Some(_) if self.loose() => None,
            _ => {
                let found = self.describe_current();
                return self.well_formedness_error(format!("{PRODUCTION}: expected quote, found {found}"));
            }
        };
        let entity = self.entities.current().id();
        let mut value = String::new();
        loop {
            let Some(c) = self.current() else {
                if quote.is_none() {
                    return Ok(value);
                }
                return self.well_formedness_error(format!("{PRODUCTION}: unterminated value"));
            };
            match quote {
                Some(q) if c == q && self.entities.current().id() == entity => {
                    self.next_char()?;
                    return Ok(value);
                }
                None if is_s(c) || matches!(c, '<' | '>' | '"' | '\'') => return Ok(value),
                _ => {}
            }
            match c {
                '&' => value.push_str(&self.parse_reference()?),
                '<' if !self.loose() => {
                    return self.well_formedness_error(
                        "No < in Attribute Values: '<' in attribute value",
                    );
                }
                c => {
                    self.check_char(c)?;
                    value.push(if is_s(c) { ' ' } else { c });
                    self.next_char()?;
                }
            }
        }
    }

    /// [15] Comment, after the `<!--`.
    pub(super) fn parse_comment_body(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            if self.parse_literal("--")? {
                if self.at('>') {
                    self.next_char()?;
                    return Ok(text);
                }
                if !self.loose() {
                    return self.well_formedness_error("[15] Comment: '--' inside a comment");
                }
                text.push_str("--");
                continue;
            }
            let Some(c) = self.current() else {
                return self.well_formedness_error("[15] Comment: unterminated comment");
            };
            self.check_char(c)?;
            text.push(c);
            self.next_char()?;
        }
    }

    /// [16] PI ::= '<?' PITarget (S (Char* - (Char* '?>' Char*)))? '?>',
    /// after the `<?`. Returns target and data.
    pub(super) fn parse_pi_body(&mut self) -> Result<(String, String)> {
        const PRODUCTION: &str = "[16] PI";
        let target = self.parse_required_name(PRODUCTION)?;
        if target.eq_ignore_ascii_case("xml") {
            return self.well_formedness_error(format!("[17] PITarget: {target} is reserved"));
        }
        let space = self.skip_plain_s()?;
        let mut data = String::new();
        loop {
            if self.parse_literal("?>")? {
                return Ok((target, data));
            }
            let Some(c) = self.current() else {
                return self.well_formedness_error(format!("{PRODUCTION}: unterminated processing instruction"));
            };
            if !space {
                return self.well_formedness_error(format!(
                    "{PRODUCTION}: expected white space after target {target}"
                ));
            }
            self.check_char(c)?;
            data.push(c);
            self.next_char()?;
        }
    }
}
