//! Handlers for the stylesheet element and the other top-level
//! declarations: include, import, output, whitespace control.

use crate::ast::{OutputMethod, StylesheetModule};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::{Location, XsltError};
use crate::parser::parse_stylesheet_content;
use crate::resolver::{resolve_uri, split_fragment};
use crate::schema::SUPPORTED_VERSION;
use crate::util::{OwnedAttributes, get_attr_optional, get_attr_required};

impl CompilerBuilder<'_> {
    pub(crate) fn handle_stylesheet_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let version = get_attr_required(attrs, b"version", "stylesheet", location)?;
        match version.trim().parse::<f64>() {
            Ok(v) if v > SUPPORTED_VERSION => {
                log::debug!(
                    "stylesheet declares version {}, enabling forward-compatible processing",
                    version
                );
                self.forward_compatible = true;
            }
            Ok(_) => {}
            Err(_) => {
                let err = XsltError::attribute_value(
                    "version",
                    "stylesheet",
                    format!("'{}' is not a number", version),
                    location,
                );
                self.listener.recoverable(err)?;
            }
        }
        // Included documents keep the including module's declared version.
        if self.module.version.is_empty() {
            self.module.version = version;
        }
        self.state_stack.push(BuilderState::Stylesheet);
        Ok(())
    }

    pub(crate) fn handle_include(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let href = get_attr_required(attrs, b"href", "include", location)?;
        let resolved = resolve_uri(&self.base_uri, &href);
        let (uri, fragment) = split_fragment(&resolved);
        let uri = uri.to_string();
        if self.import_stack.contains(&uri) {
            return Err(XsltError::ImportCycle(uri));
        }
        let content = self.loader.load(&uri)?;

        // Textual merge: the included document parses into this module, with
        // a fresh namespace scope and its own base URI.
        let mut chain = self.import_stack.clone();
        chain.push(uri.clone());
        let module = std::mem::take(&mut self.module);
        let mut sub = CompilerBuilder::for_include(
            module,
            uri,
            fragment.map(String::from),
            chain,
            self.loader,
            &mut *self.listener,
        );
        parse_stylesheet_content(&content, &mut sub)?;
        self.module = sub.into_module();

        self.state_stack.push(BuilderState::Hollow);
        Ok(())
    }

    pub(crate) fn handle_import(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        if self.seen_non_import {
            return Err(XsltError::structural(
                "import must precede all other top-level declarations",
                location,
            ));
        }
        let href = get_attr_required(attrs, b"href", "import", location)?;
        let resolved = resolve_uri(&self.base_uri, &href);
        let (uri, fragment) = split_fragment(&resolved);
        let uri = uri.to_string();
        if self.import_stack.contains(&uri) {
            return Err(XsltError::ImportCycle(uri));
        }
        let content = self.loader.load(&uri)?;

        // The imported document becomes its own module, recorded as a
        // lower-precedence predecessor of this one.
        let mut chain = self.import_stack.clone();
        chain.push(uri.clone());
        let imported = StylesheetModule {
            base_uri: uri.clone(),
            ..StylesheetModule::default()
        };
        let mut sub = CompilerBuilder::for_include(
            imported,
            uri,
            fragment.map(String::from),
            chain,
            self.loader,
            &mut *self.listener,
        );
        parse_stylesheet_content(&content, &mut sub)?;
        self.module.imports.push(sub.into_module());

        self.state_stack.push(BuilderState::Hollow);
        Ok(())
    }

    pub(crate) fn handle_output(
        &mut self,
        attrs: &OwnedAttributes,
        _location: Location,
    ) -> Result<(), XsltError> {
        if let Some(method) = get_attr_optional(attrs, b"method")? {
            self.module.output.method = match method.as_str() {
                "text" => OutputMethod::Text,
                _ => OutputMethod::Xml,
            };
        }
        if let Some(indent) = get_attr_optional(attrs, b"indent")? {
            self.module.output.indent = indent == "yes";
        }
        if let Some(omit) = get_attr_optional(attrs, b"omit-xml-declaration")? {
            self.module.output.omit_xml_declaration = omit == "yes";
        }
        self.state_stack.push(BuilderState::Hollow);
        Ok(())
    }

    pub(crate) fn handle_strip_space(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
        strip: bool,
    ) -> Result<(), XsltError> {
        let element = if strip { "strip-space" } else { "preserve-space" };
        let names = get_attr_required(attrs, b"elements", element, location)?;
        let list = if strip {
            &mut self.module.strip_space
        } else {
            &mut self.module.preserve_space
        };
        list.extend(names.split_whitespace().map(str::to_string));
        self.state_stack.push(BuilderState::Hollow);
        Ok(())
    }
}
