//! Provide the entity manager.
//!
//! The manager owns the declarations, the entity stack and the reader stack
//! of one parse session. The reader stack always holds the document frame at
//! its bottom, so it is exactly one frame deeper than the entity stack.

use std::rc::Rc;

use crate::{
    dict::{XmlDict, XmlSymbol},
    error::{
        XmlError, XmlErrorDomain, XmlErrorLevel, XmlErrorReporter, XmlParserErrors, raise_error,
    },
    generic_error,
    globals::get_parser_debug_entities,
    io::{XmlEntityResolver, XmlInputSource},
    reader::{XmlReader, XmlReaderFactory},
    uri,
};

use super::{
    XmlCharDataSink, XmlEntityContext, XmlEntityHandle, XmlEntityHandler, XmlEntityOption,
    XmlEntityTable, XmlEntityType, XmlInputKind, XmlReaderState, state::XmlReaderStateArena,
};

/// The maximum number of stacked inputs.
pub const XML_MAX_INPUT_NESTING: usize = 40;
/// The maximum number of stacked inputs if [`XmlEntityOption::Huge`] is set.
pub const XML_MAX_HUGE_INPUT_NESTING: usize = 100;
/// The name of the pseudo parameter entry pushed for the external subset.
pub const XML_EXTERNAL_SUBSET_NAME: &str = "[dtd]";

/// The entity manager of one parse session.
pub struct XmlEntityManager {
    options: i32,
    standalone: bool,
    dict: XmlDict,
    entities: XmlEntityTable,
    parameter_entities: XmlEntityTable,
    // (notation, unparsed entity)
    required_notations: Vec<(XmlSymbol, XmlSymbol)>,
    factory: XmlReaderFactory,
    resolver: Option<Box<dyn XmlEntityResolver>>,
    handler: Option<Box<dyn XmlEntityHandler>>,
    reporter: Option<Box<dyn XmlErrorReporter>>,
    arena: XmlReaderStateArena,
    reader_stack: Vec<usize>,
    entity_stack_is_pe: Vec<bool>,
    entity_stack_name: Vec<XmlSymbol>,
}

impl XmlEntityManager {
    /// Create a manager. `options` is a combination of [`XmlEntityOption`]s.
    pub fn new(options: i32) -> Self {
        let mut manager = Self {
            options: 0,
            standalone: false,
            dict: XmlDict::new(),
            entities: XmlEntityTable::new(),
            parameter_entities: XmlEntityTable::new_parameter(),
            required_notations: vec![],
            factory: XmlReaderFactory::new(),
            resolver: None,
            handler: None,
            reporter: None,
            arena: XmlReaderStateArena::default(),
            reader_stack: vec![],
            entity_stack_is_pe: vec![],
            entity_stack_name: vec![],
        };
        manager.set_options(options);
        manager.reset();
        manager
    }

    pub fn options(&self) -> i32 {
        self.options
    }

    /// Replace the options. The predefined entities are seeded by the next [`reset`](Self::reset).
    pub fn set_options(&mut self, options: i32) {
        self.options = options;
        self.factory
            .set_allow_pass_through(self.has_option(XmlEntityOption::AllowPassThroughEncodings));
    }

    fn has_option(&self, option: XmlEntityOption) -> bool {
        self.options & option as i32 != 0
    }

    /// Declare whether the document is `standalone="yes"`.
    pub fn set_standalone(&mut self, standalone: bool) {
        self.standalone = standalone;
    }

    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    pub fn set_resolver(&mut self, resolver: Option<Box<dyn XmlEntityResolver>>) {
        self.resolver = resolver;
    }

    pub fn set_handler(&mut self, handler: Option<Box<dyn XmlEntityHandler>>) {
        self.handler = handler;
    }

    /// Set the error-reporting collaborator.
    ///
    /// If `None`, diagnostics go to the global error handlers.
    pub fn set_reporter(&mut self, reporter: Option<Box<dyn XmlErrorReporter>>) {
        self.reporter = reporter;
    }

    pub fn factory_mut(&mut self) -> &mut XmlReaderFactory {
        &mut self.factory
    }

    pub fn dict(&self) -> &XmlDict {
        &self.dict
    }

    pub fn dict_mut(&mut self) -> &mut XmlDict {
        &mut self.dict
    }

    /// Return the table of general entities and notations.
    pub fn entities(&self) -> &XmlEntityTable {
        &self.entities
    }

    pub fn parameter_entities(&self) -> &XmlEntityTable {
        &self.parameter_entities
    }

    /// Forget every declaration, symbol and open input, and the standalone flag.
    ///
    /// Only the document frame is left on the reader stack.
    #[doc(alias = "xmlCtxtReset")]
    pub fn reset(&mut self) {
        self.arena.clear();
        self.reader_stack.clear();
        self.entity_stack_is_pe.clear();
        self.entity_stack_name.clear();
        self.required_notations.clear();
        self.standalone = false;
        self.dict.clear();
        let predefined = !self.has_option(XmlEntityOption::NoPredefined);
        self.entities.reset(&mut self.dict, predefined);
        self.parameter_entities.reset(&mut self.dict, false);
        let document = self.arena.alloc(XmlReaderState::new(
            XmlInputKind::Document,
            XmlEntityContext::InContent,
            0,
        ));
        self.reader_stack.push(document);
    }

    fn current(&self) -> Option<&XmlReaderState> {
        self.reader_stack.last().and_then(|&index| self.arena.get(index))
    }

    fn current_mut(&mut self) -> Option<&mut XmlReaderState> {
        self.reader_stack
            .last()
            .and_then(|&index| self.arena.get_mut(index))
    }

    /// Return the frame of the active input.
    pub fn current_state(&self) -> Option<&XmlReaderState> {
        self.current()
    }

    /// Return the active reader.
    pub fn reader(&mut self) -> Option<&mut XmlReader> {
        self.current_mut().and_then(|state| state.reader.as_mut())
    }

    pub fn public_id(&self) -> Option<&str> {
        self.current()
            .and_then(|state| state.public_id)
            .and_then(|id| self.dict.get(id))
    }

    /// Return the expanded system identifier of the active input.
    pub fn system_id(&self) -> Option<&str> {
        self.current()
            .and_then(|state| state.system_id)
            .and_then(|id| self.dict.get(id))
    }

    fn shared_system_id(&self) -> Option<Rc<str>> {
        self.current()
            .and_then(|state| state.system_id)
            .and_then(|id| self.dict.get_shared(id))
    }

    /// Return the reader depth given when the active input was opened.
    pub fn reader_depth(&self) -> usize {
        self.current().map_or(0, |state| state.depth)
    }

    pub fn context(&self) -> XmlEntityContext {
        self.current()
            .map_or(XmlEntityContext::InContent, |state| state.context)
    }

    /// Return the number of open entity references.
    pub fn entity_depth(&self) -> usize {
        self.entity_stack_name.len()
    }

    /// Return the number of frames on the reader stack, the document frame included.
    pub fn reader_stack_depth(&self) -> usize {
        self.reader_stack.len()
    }

    /// Return the name of the innermost open entity.
    pub fn current_entity_name(&self) -> Option<&str> {
        self.entity_stack_name
            .last()
            .and_then(|&name| self.dict.get(name))
    }

    /// Check if the entity `name` is open anywhere on the entity stack.
    pub fn is_entity_open(&self, name: &str, is_parameter: bool) -> bool {
        self.dict
            .lookup(name)
            .is_some_and(|name| self.is_open(name, is_parameter))
    }

    fn is_open(&self, name: XmlSymbol, is_parameter: bool) -> bool {
        self.entity_stack_name
            .iter()
            .zip(&self.entity_stack_is_pe)
            .any(|(&n, &pe)| n == name && pe == is_parameter)
    }

    fn format_reference(&self, name: XmlSymbol, is_parameter: bool) -> String {
        let name = self.dict.get(name).unwrap_or("");
        if name == XML_EXTERNAL_SUBSET_NAME {
            name.to_owned()
        } else if is_parameter {
            format!("%{name};")
        } else {
            format!("&{name};")
        }
    }

    /// Return the open entity references, outermost first, e.g. `&a; -> %b;`.
    pub fn reference_path(&self) -> String {
        self.entity_stack_name
            .iter()
            .zip(&self.entity_stack_is_pe)
            .map(|(&name, &pe)| self.format_reference(name, pe))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check if any input above the document is read from an external resource.
    fn in_external_input(&self) -> bool {
        self.reader_stack
            .iter()
            .skip(1)
            .filter_map(|&index| self.arena.get(index))
            .any(|state| state.is_external)
    }

    /// Report `error`, locating it at the active input if it has no location yet.
    pub fn report(&mut self, mut error: XmlError) {
        if error.file.is_none() {
            error.file = self.shared_system_id().map(|id| id.to_string().into());
        }
        if error.line == 0 {
            if let Some(reader) = self.current().and_then(|state| state.reader.as_ref()) {
                error.line = reader.line();
                error.int2 = reader.column() as i32;
            }
        }
        raise_error(self.reporter.as_deref_mut(), error);
    }

    fn report_fatal(&mut self, code: XmlParserErrors, name: &str, msg: String) {
        self.report(
            XmlError::fatal(XmlErrorDomain::XmlFromParser, code, msg).with_str1(name.to_owned()),
        );
    }

    fn report_recoverable(
        &mut self,
        domain: XmlErrorDomain,
        code: XmlParserErrors,
        level: XmlErrorLevel,
        name: &str,
        msg: String,
    ) {
        self.report(XmlError::new(domain, code, level, msg).with_str1(name.to_owned()));
    }

    fn report_diagnostics(&mut self) {
        let diagnostics = self
            .reader()
            .map(|reader| reader.take_diagnostics())
            .unwrap_or_default();
        for error in diagnostics {
            self.report(error);
        }
    }

    fn intern_opt(&mut self, s: Option<&str>) -> Option<XmlSymbol> {
        s.map(|s| self.dict.intern(s))
    }

    fn base_or_current(&mut self, base: Option<&str>) -> Option<XmlSymbol> {
        match base {
            Some(base) => Some(self.dict.intern(base)),
            None => self.current().and_then(|state| state.system_id),
        }
    }

    fn trace_declaration(
        &self,
        kind: &str,
        name: &str,
        result: Result<XmlEntityHandle, XmlEntityHandle>,
    ) {
        if get_parser_debug_entities() {
            match result {
                Ok(handle) => generic_error!("Declared {kind} {name} as {}\n", handle.id()),
                Err(handle) => {
                    generic_error!("{kind} {name} already declared as {}\n", handle.id())
                }
            }
        }
    }

    /// Declare an internal general entity.
    ///
    /// If `name` is already declared, the first declaration is kept and its handle is returned.
    #[doc(alias = "addInternalEntityDecl")]
    pub fn add_internal_entity_decl(&mut self, name: &str, value: &str) -> XmlEntityHandle {
        let declared_externally = self.in_external_input();
        let (sym, value) = (self.dict.intern(name), self.dict.intern(value));
        let res = self.entities.add_internal(sym, value, declared_externally);
        self.trace_declaration("entity", name, res);
        res.unwrap_or_else(|handle| handle)
    }

    /// Declare an internal parameter entity.
    #[doc(alias = "addInternalPEDecl")]
    pub fn add_internal_pe_decl(&mut self, name: &str, value: &str) -> XmlEntityHandle {
        let declared_externally = self.in_external_input();
        let (sym, value) = (self.dict.intern(name), self.dict.intern(value));
        let res = self
            .parameter_entities
            .add_internal(sym, value, declared_externally);
        self.trace_declaration("parameter entity", name, res);
        res.unwrap_or_else(|handle| handle)
    }

    /// Declare an external general entity.
    ///
    /// If `base_system_id` is `None`, the system identifier of the active input is the base.
    #[doc(alias = "addExternalEntityDecl")]
    pub fn add_external_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base_system_id: Option<&str>,
    ) -> XmlEntityHandle {
        let declared_externally = self.in_external_input();
        let sym = self.dict.intern(name);
        let public_id = self.intern_opt(public_id);
        let system_id = self.intern_opt(system_id);
        let base = self.base_or_current(base_system_id);
        let res = self
            .entities
            .add_external(sym, public_id, system_id, base, declared_externally);
        self.trace_declaration("external entity", name, res);
        res.unwrap_or_else(|handle| handle)
    }

    /// Declare an external parameter entity.
    #[doc(alias = "addExternalPEDecl")]
    pub fn add_external_pe_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base_system_id: Option<&str>,
    ) -> XmlEntityHandle {
        let declared_externally = self.in_external_input();
        let sym = self.dict.intern(name);
        let public_id = self.intern_opt(public_id);
        let system_id = self.intern_opt(system_id);
        let base = self.base_or_current(base_system_id);
        let res = self.parameter_entities.add_external(
            sym,
            public_id,
            system_id,
            base,
            declared_externally,
        );
        self.trace_declaration("external parameter entity", name, res);
        res.unwrap_or_else(|handle| handle)
    }

    /// Declare an unparsed entity.
    ///
    /// If `notation` is not declared yet, it is required by
    /// [`check_required_notations`](Self::check_required_notations).
    #[doc(alias = "addUnparsedEntityDecl")]
    pub fn add_unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base_system_id: Option<&str>,
        notation: &str,
    ) -> XmlEntityHandle {
        let declared_externally = self.in_external_input();
        let sym = self.dict.intern(name);
        let public_id = self.intern_opt(public_id);
        let system_id = self.intern_opt(system_id);
        let base = self.base_or_current(base_system_id);
        let notation = self.dict.intern(notation);
        let res = self.entities.add_unparsed(
            sym,
            public_id,
            system_id,
            base,
            notation,
            declared_externally,
        );
        if res.is_ok() && self.entities.find_notation(notation).is_none() {
            self.required_notations.push((notation, sym));
        }
        self.trace_declaration("unparsed entity", name, res);
        res.unwrap_or_else(|handle| handle)
    }

    /// Declare a notation.
    ///
    /// If `name` is already declared, a recoverable error is reported, the
    /// table is unchanged, and the handle of the first declaration is returned
    /// as the error.
    #[doc(alias = "addNotationDecl")]
    pub fn add_notation_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base_system_id: Option<&str>,
    ) -> Result<XmlEntityHandle, XmlEntityHandle> {
        let sym = self.dict.intern(name);
        let public_id = self.intern_opt(public_id);
        let system_id = self.intern_opt(system_id);
        let base = self.base_or_current(base_system_id);
        let res = self
            .entities
            .add_notation(sym, public_id, system_id, base);
        self.trace_declaration("notation", name, res);
        if res.is_err() {
            self.report_recoverable(
                XmlErrorDomain::XmlFromDTD,
                XmlParserErrors::XmlDTDNotationRedefined,
                XmlErrorLevel::XmlErrError,
                name,
                format!("Notation {name} redefined\n"),
            );
        }
        res
    }

    /// Report one recoverable error per notation required by an unparsed
    /// entity but still undeclared. Return the number of such notations.
    ///
    /// This should be called once, after the DTD has been read.
    pub fn check_required_notations(&mut self) -> usize {
        let required = std::mem::take(&mut self.required_notations);
        let mut missing: Vec<(XmlSymbol, XmlSymbol)> = vec![];
        for (notation, entity) in required {
            if self.entities.find_notation(notation).is_none()
                && missing.iter().all(|&(n, _)| n != notation)
            {
                missing.push((notation, entity));
            }
        }
        for &(notation, entity) in &missing {
            let notation = self.dict.get(notation).unwrap_or("").to_owned();
            let entity = self.dict.get(entity).unwrap_or("").to_owned();
            self.report_recoverable(
                XmlErrorDomain::XmlFromValid,
                XmlParserErrors::XmlDTDUnknownNotation,
                XmlErrorLevel::XmlErrError,
                &notation,
                format!("Notation \"{notation}\" not declared for unparsed entity \"{entity}\"\n"),
            );
        }
        missing.len()
    }

    /// Return the general entity declared as `name`.
    pub fn lookup_entity(&self, name: &str) -> Option<XmlEntityHandle> {
        self.dict
            .lookup(name)
            .and_then(|name| self.entities.find_entity(name))
    }

    /// Return the parameter entity declared as `name`.
    pub fn lookup_parameter_entity(&self, name: &str) -> Option<XmlEntityHandle> {
        self.dict
            .lookup(name)
            .and_then(|name| self.parameter_entities.find_entity(name))
    }

    /// Return the notation declared as `name`.
    pub fn lookup_notation(&self, name: &str) -> Option<XmlEntityHandle> {
        self.dict
            .lookup(name)
            .and_then(|name| self.entities.find_notation(name))
    }

    /// Check if `handle` is one of `lt`, `gt`, `amp`, `apos` and `quot`.
    ///
    /// Parameter entity handles are never predefined.
    pub fn is_predefined_entity(&self, handle: XmlEntityHandle) -> bool {
        self.entities.is_predefined(handle)
    }

    /// Expand a system identifier to an absolute URI.
    ///
    /// `Ok(None)` means that `id` needs no transformation.
    #[doc(alias = "expandSystemId")]
    pub fn expand_system_id(
        &self,
        id: &str,
        base: Option<&str>,
    ) -> Result<Option<String>, XmlError> {
        uri::expand_system_id(id, base)
    }

    /// Open an external resource through the resolver, or directly if the
    /// resolver has no opinion.
    fn open_external(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base: Option<&str>,
    ) -> Result<XmlReader, XmlError> {
        let expanded = match system_id {
            Some(id) => Some(uri::expand_system_id(id, base)?.unwrap_or_else(|| id.to_owned())),
            None => None,
        };
        let source = self
            .resolver
            .as_mut()
            .and_then(|resolver| resolver.resolve_entity(public_id, expanded.as_deref()));
        let source = match source {
            Some(source) => source,
            None => match expanded.as_deref() {
                Some(id) => XmlInputSource::new(id),
                None => {
                    return Err(XmlError::fatal(
                        XmlErrorDomain::XmlFromIO,
                        XmlParserErrors::XmlIOLoadError,
                        "failed to load external entity: no system identifier\n",
                    ));
                }
            },
        };
        let system_id = source
            .system_id()
            .map(|s| s.to_owned())
            .or(expanded);
        let source = match public_id {
            Some(public_id) if source.public_id().is_none() => source.with_public_id(public_id),
            _ => source,
        };
        self.factory
            .create_reader(source, system_id.as_deref(), true)
    }

    fn push_frame(&mut self, state: XmlReaderState) {
        if get_parser_debug_entities() {
            if let Some(id) = self.system_id() {
                generic_error!("{id}: ");
            }
            let name = state
                .entity_name
                .and_then(|name| self.dict.get(name))
                .unwrap_or("(document)");
            generic_error!("Pushing input {} : {name}\n", self.reader_stack.len() + 1);
        }
        let index = self.arena.alloc(state);
        self.reader_stack.push(index);
    }

    /// Pop the top frame and close its reader. The document frame is never popped.
    fn pop_frame(&mut self) -> Option<XmlReaderState> {
        if self.reader_stack.len() <= 1 {
            return None;
        }
        if get_parser_debug_entities() {
            generic_error!("Popping input {}\n", self.reader_stack.len());
        }
        let index = self.reader_stack.pop()?;
        let mut state = self.arena.release(index)?;
        if let Some(reader) = state.reader.as_mut() {
            reader.close();
        }
        Some(state)
    }

    fn nesting_limit(&self) -> usize {
        if self.has_option(XmlEntityOption::Huge) {
            XML_MAX_HUGE_INPUT_NESTING
        } else {
            XML_MAX_INPUT_NESTING
        }
    }

    fn undeclared_entity(&mut self, name: &str, context: XmlEntityContext) {
        let msg = if context.is_parameter() {
            format!("PEReference: %{name}; not found\n")
        } else {
            format!("Entity '{name}' not defined\n")
        };
        if matches!(
            context,
            XmlEntityContext::InContent | XmlEntityContext::InAttValue
        ) {
            self.report_fatal(XmlParserErrors::XmlErrUndeclaredEntity, name, msg);
        } else if self.has_option(XmlEntityOption::Validate) {
            self.report_recoverable(
                XmlErrorDomain::XmlFromValid,
                XmlParserErrors::XmlWarUndeclaredEntity,
                XmlErrorLevel::XmlErrWarning,
                name,
                msg,
            );
        }
    }

    /// Open the entity `name` referenced in `context`.
    ///
    /// `reader_depth` is recorded in the new frame for the caller.
    /// Contexts above [`XmlEntityContext::InContent`] open parameter entities.
    ///
    /// Return `false` if no entity has been opened. The active reader is then
    /// the same as before the call.
    #[doc(alias = "startReadingFromEntity")]
    pub fn start_reading_from_entity(
        &mut self,
        name: &str,
        reader_depth: usize,
        context: XmlEntityContext,
    ) -> bool {
        let is_pe = context.is_parameter();
        let table = if is_pe {
            &self.parameter_entities
        } else {
            &self.entities
        };
        let found = self
            .dict
            .lookup(name)
            .and_then(|sym| Some((sym, table.find_entity(sym)?)));
        let Some((sym, handle)) = found else {
            self.undeclared_entity(name, context);
            return false;
        };
        let kind = table.entity_type(handle);
        let declared_externally = table.is_declared_externally(handle);

        if self.is_open(sym, is_pe) {
            let path = format!(
                "{} -> {}",
                self.reference_path(),
                self.format_reference(sym, is_pe)
            );
            self.report_fatal(
                XmlParserErrors::XmlErrEntityLoop,
                name,
                format!("Recursive entity reference \"{name}\": {path}\n"),
            );
            return false;
        }
        if self.reader_stack.len() > self.nesting_limit() {
            self.report_fatal(
                XmlParserErrors::XmlErrEntityLoop,
                name,
                format!(
                    "entity nesting too deep, {} inputs are open\n",
                    self.reader_stack.len()
                ),
            );
            return false;
        }
        if kind == Some(XmlEntityType::Unparsed) {
            self.report_fatal(
                XmlParserErrors::XmlErrUnparsedEntity,
                name,
                format!("Entity reference to unparsed entity {name}\n"),
            );
            return false;
        }
        let is_external = kind == Some(XmlEntityType::External);
        if !is_pe && is_external && context.is_attribute_value() {
            self.report_fatal(
                XmlParserErrors::XmlErrEntityIsExternal,
                name,
                format!("Attribute references external entity '{name}'\n"),
            );
            return false;
        }
        if !is_pe
            && self.standalone
            && declared_externally
            && (context == XmlEntityContext::InContent || context.is_attribute_value())
        {
            self.report_recoverable(
                XmlErrorDomain::XmlFromValid,
                XmlParserErrors::XmlErrExtEntityStandalone,
                XmlErrorLevel::XmlErrError,
                name,
                format!(
                    "Entity reference to external declared entity '{name}' in standalone document\n"
                ),
            );
        }

        let table = if is_pe {
            &self.parameter_entities
        } else {
            &self.entities
        };
        let value = table.value(handle);
        let public_id = table.public_id(handle);
        let system_id = table.system_id(handle);
        let base = table.base_system_id(handle);

        self.entity_stack_is_pe.push(is_pe);
        self.entity_stack_name.push(sym);
        if let Some(handler) = self.handler.as_mut() {
            handler.start_entity(name, is_pe);
        }
        let parent_system_id = self.current().and_then(|state| state.system_id);
        let parent_public_id = self.current().and_then(|state| state.public_id);
        let mut state = XmlReaderState::new(
            if is_pe {
                XmlInputKind::ParameterEntity
            } else {
                XmlInputKind::GeneralEntity
            },
            context,
            reader_depth,
        );
        state.entity_name = Some(sym);
        state.is_external = is_external;
        self.push_frame(state);

        let reader = if is_external {
            let public_id = public_id.and_then(|id| self.dict.get_shared(id));
            let system_id = system_id.and_then(|id| self.dict.get_shared(id));
            let base = base
                .or(parent_system_id)
                .and_then(|id| self.dict.get_shared(id));
            self.open_external(public_id.as_deref(), system_id.as_deref(), base.as_deref())
        } else {
            let text = value
                .and_then(|value| self.dict.get_shared(value))
                .unwrap_or_else(|| Rc::from(""));
            let pad = self.has_option(XmlEntityOption::PadLiteralExpansions);
            let text = if pad && context.is_literal() {
                Rc::from(format!(" {text} "))
            } else {
                text
            };
            let parent = parent_system_id.and_then(|id| self.dict.get_shared(id));
            Ok(self.factory.create_text_reader(text, parent.as_deref()))
        };

        match reader {
            Ok(reader) => {
                let reader_id = reader.id();
                let (public_id, system_id) = if is_external {
                    let system_id = reader.system_id().map(|id| self.dict.intern(id));
                    (public_id, system_id)
                } else {
                    (parent_public_id, parent_system_id)
                };
                if let Some(state) = self.current_mut() {
                    state.reader = Some(reader);
                    state.reader_id = reader_id;
                    state.public_id = public_id;
                    state.system_id = system_id;
                }
                if let Some(handler) = self.handler.as_mut() {
                    handler.reader_changed(reader_id);
                }
                true
            }
            Err(error) => {
                if let Some(handler) = self.handler.as_mut() {
                    handler.end_entity(name, is_pe);
                }
                self.pop_frame();
                self.entity_stack_is_pe.pop();
                self.entity_stack_name.pop();
                self.report(error.with_str2(name.to_owned()));
                false
            }
        }
    }

    /// Open the document.
    ///
    /// Any input opened before, the document included, is closed first.
    #[doc(alias = "startReadingFromDocument")]
    pub fn start_reading_from_document(&mut self, source: XmlInputSource) -> bool {
        while self.entity_depth() > 0 {
            self.pop_frame();
            self.entity_stack_is_pe.pop();
            self.entity_stack_name.pop();
        }
        if let Some(state) = self.current_mut() {
            if let Some(mut reader) = state.reader.take() {
                reader.close();
            }
            state.system_id = None;
            state.public_id = None;
        }

        let expanded = match source.system_id() {
            Some(id) => match uri::expand_system_id(id, None) {
                Ok(expanded) => Some(expanded.unwrap_or_else(|| id.to_owned())),
                Err(error) => {
                    self.report(error);
                    return false;
                }
            },
            None => None,
        };
        let public_id = source.public_id().map(|s| s.to_owned());
        match self.factory.create_reader(source, expanded.as_deref(), true) {
            Ok(reader) => {
                let reader_id = reader.id();
                let public_id = self.intern_opt(public_id.as_deref());
                let system_id = self.intern_opt(reader.system_id());
                if let Some(state) = self.current_mut() {
                    state.reader = Some(reader);
                    state.reader_id = reader_id;
                    state.public_id = public_id;
                    state.system_id = system_id;
                    state.is_external = true;
                }
                if let Some(handler) = self.handler.as_mut() {
                    handler.reader_changed(reader_id);
                }
                true
            }
            Err(error) => {
                self.report(error);
                false
            }
        }
    }

    /// Open the external subset.
    ///
    /// A pseudo parameter entry named `[dtd]` is pushed on the entity stack.
    /// Return `false` if the subset could not be opened.
    #[doc(alias = "startReadingFromExternalSubset")]
    pub fn start_reading_from_external_subset(
        &mut self,
        public_id: Option<&str>,
        system_id: &str,
        reader_depth: usize,
    ) -> bool {
        let sym = self.dict.intern(XML_EXTERNAL_SUBSET_NAME);
        if self.is_open(sym, true) {
            self.report_fatal(
                XmlParserErrors::XmlErrEntityLoop,
                XML_EXTERNAL_SUBSET_NAME,
                "the external subset is already open\n".to_owned(),
            );
            return false;
        }
        self.entity_stack_is_pe.push(true);
        self.entity_stack_name.push(sym);
        if let Some(handler) = self.handler.as_mut() {
            handler.start_entity(XML_EXTERNAL_SUBSET_NAME, true);
        }
        let base = self.shared_system_id();
        let mut state = XmlReaderState::new(
            XmlInputKind::ExternalSubset,
            XmlEntityContext::InDTD,
            reader_depth,
        );
        state.entity_name = Some(sym);
        state.is_external = true;
        self.push_frame(state);

        match self.open_external(public_id, Some(system_id), base.as_deref()) {
            Ok(reader) => {
                let reader_id = reader.id();
                let public_id = self.intern_opt(public_id);
                let system_id = self.intern_opt(reader.system_id());
                if let Some(state) = self.current_mut() {
                    state.reader = Some(reader);
                    state.reader_id = reader_id;
                    state.public_id = public_id;
                    state.system_id = system_id;
                }
                if let Some(handler) = self.handler.as_mut() {
                    handler.reader_changed(reader_id);
                }
                true
            }
            Err(error) => {
                if let Some(handler) = self.handler.as_mut() {
                    handler.end_entity(XML_EXTERNAL_SUBSET_NAME, true);
                }
                self.pop_frame();
                self.entity_stack_is_pe.pop();
                self.entity_stack_name.pop();
                self.report(error);
                false
            }
        }
    }

    /// Close the active input and restore its parent.
    ///
    /// This is called when the active reader is exhausted, or by the scanner
    /// to abandon an entity. At the document level, only the end of input is
    /// notified and `None` is returned.
    #[doc(alias = "changeReaders")]
    pub fn change_readers(&mut self) -> Option<&mut XmlReader> {
        let entities_remain_open = !self.entity_stack_name.is_empty();
        if let Some(handler) = self.handler.as_mut() {
            handler.end_of_input(entities_remain_open);
        }
        if !entities_remain_open {
            return None;
        }
        self.report_diagnostics();
        let name = self
            .entity_stack_name
            .last()
            .and_then(|&name| self.dict.get_shared(name));
        let is_pe = self.entity_stack_is_pe.last().copied().unwrap_or(false);
        if let (Some(handler), Some(name)) = (self.handler.as_mut(), name.as_deref()) {
            handler.end_entity(name, is_pe);
        }
        self.pop_frame();
        let parent_id = self.current().and_then(|state| state.reader.as_ref().map(|r| r.id()));
        if let (Some(handler), Some(parent_id)) = (self.handler.as_mut(), parent_id) {
            handler.reader_changed(parent_id);
        }
        self.entity_stack_is_pe.pop();
        self.entity_stack_name.pop();
        self.reader()
    }

    /// Consume the next character of the active input.
    ///
    /// Diagnostics reached by the cursor are reported. `None` means that the
    /// active input is exhausted and [`change_readers`](Self::change_readers) should be called.
    pub fn read_char(&mut self) -> Option<char> {
        let c = self.reader()?.next_char();
        self.report_diagnostics();
        c
    }

    /// Deliver the rest of the current chunk of the active input to `sink`.
    ///
    /// Return `false` if the active input is exhausted.
    pub fn deliver_chunk(&mut self, sink: &mut dyn XmlCharDataSink) -> bool {
        let Some(reader) = self.reader() else {
            return false;
        };
        let mut units = reader.take_chunk();
        if units.is_empty() {
            let exhausted = reader.is_exhausted();
            self.report_diagnostics();
            return !exhausted;
        }
        // keep surrogate pairs together
        if units.last().is_some_and(|&u| (0xD800..0xDC00).contains(&u)) {
            if let Some(low) = reader.peek_unit().filter(|&u| (0xDC00..0xE000).contains(&u)) {
                reader.next_unit();
                units.push(low);
            }
        }
        let text = String::from_utf16_lossy(&units);
        if sink.wants_symbols() {
            sink.symbol(self.dict.intern(&text));
        } else {
            sink.characters(&text);
        }
        self.report_diagnostics();
        true
    }
}

impl Default for XmlEntityManager {
    fn default() -> Self {
        Self::new(0)
    }
}
