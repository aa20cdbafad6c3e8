//! The public entry points: compile a stylesheet once, transform source
//! documents many times.

use crate::ast::{OutputOptions, ParamDef, StylesheetModule, TemplateDef, VariableValue};
use crate::compiler::CompilerBuilder;
use crate::datasources::XmlDocument;
use crate::error::{ErrorListener, FatalErrorListener, XsltError};
use crate::executor::TemplateExecutor;
use crate::output::{EventSink, XmlWriter};
use crate::parser::parse_stylesheet_content;
use crate::resolver::{ResourceLoader, split_fragment};
use crate::rules::{self, RuleTable};
use crate::specialize::{self, Program};
use salix_xpath::DataSourceNode;
use std::collections::HashMap;

pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Per-invocation knobs for a transformation.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub max_recursion_depth: usize,
    /// String values bound to top-level params, overriding their defaults.
    pub parameters: HashMap<String, String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            parameters: HashMap::new(),
        }
    }
}

/// A frozen, reusable stylesheet: the flattened template arena, the rule
/// table, and the optional specialized programs. Immutable after
/// compilation, so one instance can serve any number of transformations.
pub struct CompiledStylesheet {
    pub(crate) templates: Vec<TemplateDef>,
    /// Specialized programs, parallel to `templates`. `None` entries are
    /// interpreted from the tree form.
    pub(crate) programs: Vec<Option<Program>>,
    pub(crate) rules: RuleTable,
    pub(crate) named_templates: HashMap<String, usize>,
    /// Global bindings in evaluation order; lower precedence first, so
    /// later entries shadow earlier ones.
    pub(crate) global_variables: Vec<(String, VariableValue)>,
    pub(crate) global_params: Vec<ParamDef>,
    pub output: OutputOptions,
    pub(crate) strip_space: Vec<String>,
    pub(crate) preserve_space: Vec<String>,
}

impl CompiledStylesheet {
    fn freeze(module: StylesheetModule, specialize_templates: bool) -> Self {
        let composition = rules::compose(&module);
        let programs = composition
            .templates
            .iter()
            .map(|t| specialize_templates.then(|| specialize::compile_template(&t.body)))
            .collect();

        let mut global_variables = Vec::new();
        let mut global_params = Vec::new();
        let mut strip_space = Vec::new();
        let mut preserve_space = Vec::new();
        for imported in rules::flatten_modules(&module).iter().rev() {
            global_variables.extend(imported.global_variables.iter().cloned());
            global_params.extend(imported.global_params.iter().cloned());
            strip_space.extend(imported.strip_space.iter().cloned());
            preserve_space.extend(imported.preserve_space.iter().cloned());
        }

        CompiledStylesheet {
            templates: composition.templates,
            programs,
            rules: composition.table,
            named_templates: composition.named_templates,
            global_variables,
            global_params,
            output: module.output,
            strip_space,
            preserve_space,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Transforms a source tree, pushing result events into `sink`.
    pub fn transform<'a, N: DataSourceNode<'a> + 'a>(
        &self,
        root: N,
        options: &TransformOptions,
        sink: &mut dyn EventSink,
    ) -> Result<(), XsltError> {
        let mut executor = TemplateExecutor::new(self, root, options.max_recursion_depth);
        executor.bind_globals(&options.parameters)?;
        executor.run(sink)
    }

    /// Convenience: parse `source_xml`, transform it, and serialize the
    /// result with the stylesheet's output options.
    pub fn transform_str(
        &self,
        source_xml: &str,
        options: &TransformOptions,
    ) -> Result<String, XsltError> {
        let document = XmlDocument::parse(source_xml)?;
        let mut writer = XmlWriter::new(self.output.clone());
        self.transform(document.root_node(), options, &mut writer)?;
        Ok(writer.finish())
    }
}

/// Compiles stylesheet documents into [`CompiledStylesheet`]s, resolving
/// includes and imports through the given loader.
pub struct XsltCompiler<'l> {
    loader: &'l dyn ResourceLoader,
    specialize_templates: bool,
}

impl<'l> XsltCompiler<'l> {
    pub fn new(loader: &'l dyn ResourceLoader) -> Self {
        XsltCompiler {
            loader,
            specialize_templates: true,
        }
    }

    /// Turns template specialization off; every template is then
    /// interpreted from its tree form.
    pub fn without_specialization(mut self) -> Self {
        self.specialize_templates = false;
        self
    }

    /// Compiles the document at `uri`. A `#fragment` suffix restricts
    /// compilation to the subtree of the element carrying that ID.
    pub fn compile(&self, uri: &str) -> Result<CompiledStylesheet, XsltError> {
        let mut listener = FatalErrorListener;
        self.compile_with_listener(uri, &mut listener)
    }

    pub fn compile_with_listener(
        &self,
        uri: &str,
        listener: &mut dyn ErrorListener,
    ) -> Result<CompiledStylesheet, XsltError> {
        let (base, fragment) = split_fragment(uri);
        let source = self.loader.load(base)?;
        self.compile_source(&source, base, fragment, listener)
    }

    /// Compiles in-memory stylesheet text. `base_uri` anchors relative
    /// include/import references and may carry a `#fragment`.
    pub fn compile_str(
        &self,
        source: &str,
        base_uri: &str,
    ) -> Result<CompiledStylesheet, XsltError> {
        let mut listener = FatalErrorListener;
        let (base, fragment) = split_fragment(base_uri);
        self.compile_source(source, base, fragment, &mut listener)
    }

    fn compile_source(
        &self,
        source: &str,
        base_uri: &str,
        fragment: Option<&str>,
        listener: &mut dyn ErrorListener,
    ) -> Result<CompiledStylesheet, XsltError> {
        let mut builder = CompilerBuilder::new(
            base_uri,
            fragment.map(str::to_string),
            self.loader,
            listener,
        );
        parse_stylesheet_content(source, &mut builder)?;
        let module = builder.into_module();
        Ok(CompiledStylesheet::freeze(module, self.specialize_templates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::InMemoryLoader;

    fn compile(source: &str) -> CompiledStylesheet {
        let loader = InMemoryLoader::new();
        XsltCompiler::new(&loader)
            .compile_str(source, "main.xsl")
            .unwrap()
    }

    fn run(stylesheet: &CompiledStylesheet, xml: &str) -> String {
        stylesheet
            .transform_str(xml, &TransformOptions::default())
            .unwrap()
    }

    const NODECL: &str = r#"<xsl:output omit-xml-declaration="yes"/>"#;

    #[test]
    fn transforms_a_simple_document() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <out><xsl:value-of select="order/item"/></out>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<order><item>pen</item><item>ink</item></order>");
        assert_eq!(out, "<out>pen</out>");
    }

    #[test]
    fn built_in_rules_recurse_and_copy_text() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="item"><i><xsl:apply-templates/></i></xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<order><item>pen</item><item>ink</item></order>");
        assert_eq!(out, "<i>pen</i><i>ink</i>");
    }

    #[test]
    fn last_matching_template_wins_on_full_tie() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="item">first</xsl:template>
                 <xsl:template match="item">second</xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<order><item/></order>");
        assert_eq!(out, "second");
    }

    #[test]
    fn explicit_priority_outranks_document_order() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="item" priority="1">first</xsl:template>
                 <xsl:template match="item">second</xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<order><item/></order>");
        assert_eq!(out, "first");
    }

    #[test]
    fn includes_merge_at_the_includer_precedence() {
        let loader = InMemoryLoader::new()
            .with(
                "main.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:output omit-xml-declaration="yes"/>
                     <xsl:include href="lib.xsl"/>
                     <xsl:template match="item">main</xsl:template>
                   </xsl:stylesheet>"#,
            )
            .with(
                "lib.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:template match="item" priority="2">lib</xsl:template>
                   </xsl:stylesheet>"#,
            );
        let stylesheet = XsltCompiler::new(&loader).compile("main.xsl").unwrap();
        // Included rules share the includer's precedence, so the included
        // template's higher priority decides.
        let out = run(&stylesheet, "<order><item/></order>");
        assert_eq!(out, "lib");
    }

    #[test]
    fn importing_stylesheet_beats_imported_priority() {
        let loader = InMemoryLoader::new()
            .with(
                "main.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:import href="lib.xsl"/>
                     <xsl:output omit-xml-declaration="yes"/>
                     <xsl:template match="item" priority="1">main</xsl:template>
                   </xsl:stylesheet>"#,
            )
            .with(
                "lib.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:template match="item" priority="5">lib</xsl:template>
                   </xsl:stylesheet>"#,
            );
        let stylesheet = XsltCompiler::new(&loader).compile("main.xsl").unwrap();
        let out = run(&stylesheet, "<order><item/></order>");
        assert_eq!(out, "main");
    }

    #[test]
    fn imported_templates_fill_gaps() {
        let loader = InMemoryLoader::new()
            .with(
                "main.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:import href="lib.xsl"/>
                     <xsl:output omit-xml-declaration="yes"/>
                     <xsl:template match="item">main</xsl:template>
                   </xsl:stylesheet>"#,
            )
            .with(
                "lib.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:template match="note">lib-note</xsl:template>
                   </xsl:stylesheet>"#,
            );
        let stylesheet = XsltCompiler::new(&loader).compile("main.xsl").unwrap();
        let out = run(&stylesheet, "<order><item/><note/></order>");
        assert_eq!(out, "mainlib-note");
    }

    #[test]
    fn import_cycles_are_rejected() {
        let loader = InMemoryLoader::new()
            .with(
                "a.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:import href="b.xsl"/>
                   </xsl:stylesheet>"#,
            )
            .with(
                "b.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:import href="a.xsl"/>
                   </xsl:stylesheet>"#,
            );
        let result = XsltCompiler::new(&loader).compile("a.xsl");
        assert!(matches!(result, Err(XsltError::ImportCycle(_))));
    }

    #[test]
    fn include_cycles_are_rejected() {
        let loader = InMemoryLoader::new()
            .with(
                "a.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:include href="b.xsl"/>
                   </xsl:stylesheet>"#,
            )
            .with(
                "b.xsl",
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     <xsl:include href="a.xsl"/>
                   </xsl:stylesheet>"#,
            );
        let result = XsltCompiler::new(&loader).compile("a.xsl");
        assert!(matches!(result, Err(XsltError::ImportCycle(_))));
    }

    #[test]
    fn import_after_other_declarations_is_structural() {
        let loader = InMemoryLoader::new().with(
            "lib.xsl",
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"/>"#,
        );
        let source = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                          <xsl:template match="/"/>
                          <xsl:import href="lib.xsl"/>
                        </xsl:stylesheet>"#;
        let result = XsltCompiler::new(&loader).compile_str(source, "main.xsl");
        assert!(matches!(result, Err(XsltError::Structural { .. })));
    }

    #[test]
    fn recursion_limit_fails_the_run_but_not_the_stylesheet() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="item"><xsl:apply-templates select="."/></xsl:template>
                 <xsl:template match="note">safe</xsl:template>
               </xsl:stylesheet>"#
        ));
        let options = TransformOptions {
            max_recursion_depth: 32,
            ..TransformOptions::default()
        };
        let failing = stylesheet.transform_str("<order><item/></order>", &options);
        assert!(matches!(failing, Err(XsltError::RecursionLimit(32))));

        // Same compiled stylesheet, next document: works.
        let ok = stylesheet
            .transform_str("<order><note/></order>", &options)
            .unwrap();
        assert_eq!(ok, "safe");
    }

    #[test]
    fn sort_keys_reorder_iteration() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <xsl:for-each select="order/item">
                     <xsl:sort select="@rank" data-type="number" order="descending"/>
                     [<xsl:value-of select="."/>]
                   </xsl:for-each>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(
            &stylesheet,
            r#"<order><item rank="2">b</item><item rank="10">c</item><item rank="1">a</item></order>"#,
        );
        assert_eq!(out.replace(char::is_whitespace, ""), "[c][b][a]");
    }

    #[test]
    fn text_sort_falls_back_to_document_order_on_ties() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <xsl:apply-templates select="order/item">
                     <xsl:sort select="@group"/>
                   </xsl:apply-templates>
                 </xsl:template>
                 <xsl:template match="item">[<xsl:value-of select="."/>]</xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(
            &stylesheet,
            r#"<order><item group="b">3</item><item group="a">1</item><item group="a">2</item></order>"#,
        );
        assert_eq!(out, "[1][2][3]");
    }

    #[test]
    fn processing_instructions_reach_the_output() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <doc>
                     <xsl:processing-instruction name="{{order/@app}}-style">kind="fancy"</xsl:processing-instruction>
                   </doc>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, r#"<order app="viewer"/>"#);
        assert_eq!(out, r#"<doc><?viewer-style kind="fancy"?></doc>"#);
    }

    #[test]
    fn forward_compatible_mode_skips_unknown_instructions() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="2.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <xsl:sequence select="1"/>
                   <out>ok</out>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<order/>");
        assert_eq!(out, "<out>ok</out>");
    }

    #[test]
    fn fallback_inside_an_unknown_instruction_runs() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="2.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <xsl:try select="order">
                     <xsl:fallback><out>fell back</out></xsl:fallback>
                   </xsl:try>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<order/>");
        assert_eq!(out, "<out>fell back</out>");
    }

    #[test]
    fn fallback_under_a_known_instruction_is_inert() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <xsl:if test="true()">ran<xsl:fallback>never</xsl:fallback></xsl:if>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        assert_eq!(run(&stylesheet, "<order/>"), "ran");
    }

    #[test]
    fn unknown_elements_are_fatal_without_forward_compatibility() {
        let loader = InMemoryLoader::new();
        let source = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                          <xsl:template match="/"><xsl:sequence select="1"/></xsl:template>
                        </xsl:stylesheet>"#;
        let result = XsltCompiler::new(&loader).compile_str(source, "main.xsl");
        assert!(matches!(result, Err(XsltError::Structural { .. })));
    }

    #[test]
    fn fragment_uri_compiles_only_the_identified_subtree() {
        let loader = InMemoryLoader::new().with(
            "doc.xml",
            r#"<doc>
                 <xsl:stylesheet id="embedded" version="1.0"
                                 xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                   <xsl:output omit-xml-declaration="yes"/>
                   <xsl:template match="/">embedded</xsl:template>
                 </xsl:stylesheet>
                 <trailing>junk that is not a stylesheet</trailing>
               </doc>"#,
        );
        let stylesheet = XsltCompiler::new(&loader).compile("doc.xml#embedded").unwrap();
        let out = run(&stylesheet, "<x/>");
        assert_eq!(out, "embedded");
    }

    #[test]
    fn specialized_and_interpreted_templates_agree() {
        let source = format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <report title="{{order/@id}}">
                     <xsl:choose>
                       <xsl:when test="order/@rush">rush</xsl:when>
                       <xsl:otherwise>standard</xsl:otherwise>
                     </xsl:choose>
                     <xsl:if test="order/item">
                       <xsl:apply-templates select="order/item"/>
                     </xsl:if>
                   </report>
                 </xsl:template>
                 <xsl:template match="item"><i><xsl:value-of select="."/></i></xsl:template>
               </xsl:stylesheet>"#
        );
        let loader = InMemoryLoader::new();
        let fast = XsltCompiler::new(&loader)
            .compile_str(&source, "main.xsl")
            .unwrap();
        let slow = XsltCompiler::new(&loader)
            .without_specialization()
            .compile_str(&source, "main.xsl")
            .unwrap();

        let xml = r#"<order id="7"><item>pen</item><item>ink</item></order>"#;
        let options = TransformOptions::default();
        assert_eq!(
            fast.transform_str(xml, &options).unwrap(),
            slow.transform_str(xml, &options).unwrap()
        );
        assert_eq!(
            fast.transform_str(xml, &options).unwrap(),
            "<report title=\"7\">standard<i>pen</i><i>ink</i></report>"
        );
    }

    #[test]
    fn caller_parameters_override_param_defaults() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:param name="lang" select="'en'"/>
                 <xsl:template match="/"><xsl:value-of select="$lang"/></xsl:template>
               </xsl:stylesheet>"#
        ));
        let options = TransformOptions::default();
        assert_eq!(stylesheet.transform_str("<x/>", &options).unwrap(), "en");

        let mut with_param = TransformOptions::default();
        with_param
            .parameters
            .insert("lang".to_string(), "no".to_string());
        assert_eq!(
            stylesheet.transform_str("<x/>", &with_param).unwrap(),
            "no"
        );
    }

    #[test]
    fn modes_select_disjoint_rule_sets() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <xsl:apply-templates select="order/item" mode="toc"/>
                   <xsl:apply-templates select="order/item"/>
                 </xsl:template>
                 <xsl:template match="item" mode="toc">[toc]</xsl:template>
                 <xsl:template match="item">[body]</xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<order><item/></order>");
        assert_eq!(out, "[toc][body]");
    }

    #[test]
    fn named_templates_receive_params() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <xsl:call-template name="greet">
                     <xsl:with-param name="who" select="'world'"/>
                   </xsl:call-template>
                 </xsl:template>
                 <xsl:template name="greet">
                   <xsl:param name="who" select="'nobody'"/>
                   <p>hello <xsl:value-of select="$who"/></p>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<x/>");
        assert_eq!(out, "<p>hello world</p>");
    }

    #[test]
    fn missing_named_template_is_an_execution_error() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/"><xsl:call-template name="ghost"/></xsl:template>
               </xsl:stylesheet>"#
        ));
        let result = stylesheet.transform_str("<x/>", &TransformOptions::default());
        assert!(matches!(result, Err(XsltError::UnknownTemplate(name)) if name == "ghost"));
    }

    #[test]
    fn global_variables_are_visible_everywhere() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:variable name="sep" select="'-'"/>
                 <xsl:template match="/">
                   <xsl:for-each select="order/item">
                     <xsl:value-of select="."/><xsl:value-of select="$sep"/>
                   </xsl:for-each>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<order><item>a</item><item>b</item></order>");
        assert_eq!(out, "a-b-");
    }

    #[test]
    fn foreign_top_level_elements_are_skipped() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
                              xmlns:ext="http://example.com/ext">
                 {NODECL}
                 <ext:config><ext:option name="x"/></ext:config>
                 <xsl:template match="/">ok</xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, "<x/>");
        assert_eq!(out, "ok");
    }

    #[test]
    fn terminating_message_aborts_the_run() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/">
                   <xsl:message terminate="yes">bad input</xsl:message>
                 </xsl:template>
               </xsl:stylesheet>"#
        ));
        let result = stylesheet.transform_str("<x/>", &TransformOptions::default());
        assert!(matches!(result, Err(XsltError::Execution(msg)) if msg.contains("bad input")));
    }

    #[test]
    fn union_patterns_count_one_rule_per_alternative() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="item|note">x</xsl:template>
               </xsl:stylesheet>"#
        ));
        assert_eq!(stylesheet.rule_count(), 2);
        let out = run(&stylesheet, "<order><item/><note/></order>");
        assert_eq!(out, "xx");
    }

    #[test]
    fn swallowing_listener_recovers_from_bad_attribute_values() {
        use crate::error::CollectingErrorListener;

        let loader = InMemoryLoader::new().with(
            "main.xsl",
            format!(
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     {NODECL}
                     <xsl:template match="item" priority="high">loud</xsl:template>
                     <xsl:template match="item">quiet</xsl:template>
                   </xsl:stylesheet>"#
            ),
        );
        let compiler = XsltCompiler::new(&loader);

        // The default listener escalates.
        assert!(compiler.compile("main.xsl").is_err());

        // A swallowing listener records the problem and the template falls
        // back to its default priority, so document order decides.
        let mut listener = CollectingErrorListener::default();
        let stylesheet = compiler
            .compile_with_listener("main.xsl", &mut listener)
            .unwrap();
        assert!(!listener.errors.is_empty());
        assert_eq!(run(&stylesheet, "<order><item/></order>"), "quiet");
    }

    #[test]
    fn swallowing_listener_drops_a_template_with_a_bad_match_pattern() {
        use crate::error::CollectingErrorListener;

        let loader = InMemoryLoader::new().with(
            "main.xsl",
            format!(
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     {NODECL}
                     <xsl:template match="item[[[">broken</xsl:template>
                     <xsl:template match="item">good</xsl:template>
                   </xsl:stylesheet>"#
            ),
        );
        let compiler = XsltCompiler::new(&loader);

        // The default listener escalates the unparseable pattern.
        let fatal = compiler.compile("main.xsl");
        assert!(matches!(fatal, Err(XsltError::AttributeValue { .. })));

        // A swallowing listener drops the broken template; the good one
        // still fires.
        let mut listener = CollectingErrorListener::default();
        let stylesheet = compiler
            .compile_with_listener("main.xsl", &mut listener)
            .unwrap();
        assert_eq!(listener.errors.len(), 1);
        assert_eq!(run(&stylesheet, "<order><item/></order>"), "good");
    }

    #[test]
    fn swallowing_listener_drops_instructions_with_bad_expressions() {
        use crate::error::CollectingErrorListener;

        let loader = InMemoryLoader::new().with(
            "main.xsl",
            format!(
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     {NODECL}
                     <xsl:template match="/">
                       <xsl:if test="item[">never</xsl:if>
                       <xsl:value-of select="order/["/>
                       <xsl:for-each select="]]"><xsl:sort select="."/>never</xsl:for-each>
                       <xsl:text>kept</xsl:text>
                     </xsl:template>
                   </xsl:stylesheet>"#
            ),
        );
        let compiler = XsltCompiler::new(&loader);

        assert!(matches!(
            compiler.compile("main.xsl"),
            Err(XsltError::AttributeValue { .. })
        ));

        // Each broken construct is dropped independently; the rest of the
        // template body survives.
        let mut listener = CollectingErrorListener::default();
        let stylesheet = compiler
            .compile_with_listener("main.xsl", &mut listener)
            .unwrap();
        assert_eq!(listener.errors.len(), 3);
        assert_eq!(run(&stylesheet, "<order><item/></order>"), "kept");
    }

    #[test]
    fn swallowing_listener_drops_a_variable_with_a_bad_select() {
        use crate::error::CollectingErrorListener;

        let loader = InMemoryLoader::new().with(
            "main.xsl",
            format!(
                r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                     {NODECL}
                     <xsl:template match="/">
                       <xsl:variable name="x" select="item[["/>
                       <xsl:text>still here</xsl:text>
                     </xsl:template>
                   </xsl:stylesheet>"#
            ),
        );
        let compiler = XsltCompiler::new(&loader);

        let mut listener = CollectingErrorListener::default();
        let stylesheet = compiler
            .compile_with_listener("main.xsl", &mut listener)
            .unwrap();
        assert_eq!(listener.errors.len(), 1);
        assert_eq!(run(&stylesheet, "<order/>"), "still here");
    }

    #[test]
    fn copy_of_deep_copies_selected_nodes() {
        let stylesheet = compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 {NODECL}
                 <xsl:template match="/"><xsl:copy-of select="order/item"/></xsl:template>
               </xsl:stylesheet>"#
        ));
        let out = run(&stylesheet, r#"<order><item id="1">pen</item></order>"#);
        assert_eq!(out, r#"<item id="1">pen</item>"#);
    }
}
