//! Decoder descriptors
//!
//! A [`DecoderDescriptor`] is the immutable template of a decoder type: its
//! probes, option schema, annotation/binary classes, output kinds and the
//! factory that builds its logic. Descriptors are built once with
//! [`DescriptorBuilder`] and shared by every instance through an `Arc`.

use super::errors::{Error, LogicResult, Result};
use super::logic::DecoderLogic;
use super::output::OutputKind;
use super::variant::Variant;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Factory producing a fresh logic object for each instance
pub type LogicFactory = Arc<dyn Fn() -> LogicResult<Box<dyn DecoderLogic>> + Send + Sync>;

/// One input channel a decoder reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub id: String,
    pub name: String,
    pub desc: String,
    /// Position in the combined required ++ optional list
    pub order: usize,
}

/// One configurable decoder option
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub id: String,
    pub desc: String,
    /// Default value; its tag declares the option type
    pub default: Variant,
}

/// An annotation or binary class: short id plus description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSpec {
    pub id: String,
    pub desc: String,
}

/// Immutable decoder type template
pub struct DecoderDescriptor {
    id: String,
    name: String,
    longname: String,
    desc: String,
    license: String,
    probes: Vec<ProbeSpec>,
    optional_probes: Vec<ProbeSpec>,
    options: Vec<OptionSpec>,
    annotations: Vec<ClassSpec>,
    binary: Vec<ClassSpec>,
    outputs: Vec<OutputKind>,
    factory: LogicFactory,
}

impl DecoderDescriptor {
    /// Start building a descriptor with the given id and logic factory
    pub fn builder<F>(id: impl Into<String>, factory: F) -> DescriptorBuilder
    where
        F: Fn() -> LogicResult<Box<dyn DecoderLogic>> + Send + Sync + 'static,
    {
        DescriptorBuilder::new(id, Arc::new(factory))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn longname(&self) -> &str {
        &self.longname
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn license(&self) -> &str {
        &self.license
    }

    /// Required probes, in order
    pub fn probes(&self) -> &[ProbeSpec] {
        &self.probes
    }

    /// Optional probes, in order (their `order` continues after the required ones)
    pub fn optional_probes(&self) -> &[ProbeSpec] {
        &self.optional_probes
    }

    /// Total number of probes (required + optional)
    pub fn num_probes(&self) -> usize {
        self.probes.len() + self.optional_probes.len()
    }

    /// Find a probe by id, required probes first
    pub fn find_probe(&self, id: &str) -> Option<&ProbeSpec> {
        self.probes
            .iter()
            .find(|p| p.id == id)
            .or_else(|| self.optional_probes.iter().find(|p| p.id == id))
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn annotations(&self) -> &[ClassSpec] {
        &self.annotations
    }

    pub fn binary_classes(&self) -> &[ClassSpec] {
        &self.binary
    }

    pub fn output_kinds(&self) -> &[OutputKind] {
        &self.outputs
    }

    pub(crate) fn construct_logic(&self) -> LogicResult<Box<dyn DecoderLogic>> {
        (self.factory)()
    }
}

impl fmt::Debug for DecoderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DecoderDescriptor")
            .field("id", &self.id)
            .field("probes", &self.probes)
            .field("optional_probes", &self.optional_probes)
            .field("options", &self.options)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Builder for [`DecoderDescriptor`]
pub struct DescriptorBuilder {
    id: String,
    name: Option<String>,
    longname: Option<String>,
    desc: String,
    license: String,
    probes: Vec<(String, String, String)>,
    optional_probes: Vec<(String, String, String)>,
    options: Vec<OptionSpec>,
    annotations: Vec<ClassSpec>,
    binary: Vec<ClassSpec>,
    outputs: Vec<OutputKind>,
    factory: LogicFactory,
}

impl DescriptorBuilder {
    fn new(id: impl Into<String>, factory: LogicFactory) -> Self {
        Self {
            id: id.into(),
            name: None,
            longname: None,
            desc: String::new(),
            license: "gplv2+".to_string(),
            probes: Vec::new(),
            optional_probes: Vec::new(),
            options: Vec::new(),
            annotations: Vec::new(),
            binary: Vec::new(),
            outputs: Vec::new(),
            factory,
        }
    }

    /// Short name (defaults to the id)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Long name (defaults to the short name)
    pub fn with_longname(mut self, longname: impl Into<String>) -> Self {
        self.longname = Some(longname.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    /// Add a required probe
    pub fn probe(mut self, id: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        self.probes.push((id.into(), name.into(), desc.into()));
        self
    }

    /// Add an optional probe
    pub fn optional_probe(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        desc: impl Into<String>,
    ) -> Self {
        self.optional_probes.push((id.into(), name.into(), desc.into()));
        self
    }

    /// Add an option; the default's tag declares the option type
    pub fn option(mut self, id: impl Into<String>, desc: impl Into<String>, default: impl Into<Variant>) -> Self {
        self.options.push(OptionSpec {
            id: id.into(),
            desc: desc.into(),
            default: default.into(),
        });
        self
    }

    /// Add an annotation class
    pub fn annotation(mut self, id: impl Into<String>, desc: impl Into<String>) -> Self {
        self.annotations.push(ClassSpec {
            id: id.into(),
            desc: desc.into(),
        });
        self
    }

    /// Add a binary output class
    pub fn binary(mut self, id: impl Into<String>, desc: impl Into<String>) -> Self {
        self.binary.push(ClassSpec {
            id: id.into(),
            desc: desc.into(),
        });
        self
    }

    /// Declare an output kind this decoder may register
    pub fn output(mut self, kind: OutputKind) -> Self {
        if !self.outputs.contains(&kind) {
            self.outputs.push(kind);
        }
        self
    }

    /// Validate and assemble the descriptor
    ///
    /// Option default types are checked later, when an instance is configured.
    pub fn build(self) -> Result<DecoderDescriptor> {
        if self.id.is_empty() {
            return Err(Error::arg("decoder id must not be empty"));
        }

        let mut seen = HashSet::new();
        for (probe_id, _, _) in self.probes.iter().chain(self.optional_probes.iter()) {
            if !seen.insert(probe_id.as_str()) {
                return Err(Error::arg(format!(
                    "decoder '{}' declares probe '{}' twice",
                    self.id, probe_id
                )));
            }
        }

        let mut seen = HashSet::new();
        for opt in &self.options {
            if opt.id == "id" {
                return Err(Error::arg(format!(
                    "decoder '{}' uses the reserved option id 'id'",
                    self.id
                )));
            }
            if !seen.insert(opt.id.as_str()) {
                return Err(Error::arg(format!(
                    "decoder '{}' declares option '{}' twice",
                    self.id, opt.id
                )));
            }
        }

        let num_required = self.probes.len();
        let to_spec = |offset: usize| {
            move |(order, (id, name, desc)): (usize, (String, String, String))| ProbeSpec {
                id,
                name,
                desc,
                order: offset + order,
            }
        };
        let probes = self.probes.into_iter().enumerate().map(to_spec(0)).collect();
        let optional_probes = self
            .optional_probes
            .into_iter()
            .enumerate()
            .map(to_spec(num_required))
            .collect();

        let name = self.name.unwrap_or_else(|| self.id.clone());
        let longname = self.longname.unwrap_or_else(|| name.clone());

        Ok(DecoderDescriptor {
            id: self.id,
            name,
            longname,
            desc: self.desc,
            license: self.license,
            probes,
            optional_probes,
            options: self.options,
            annotations: self.annotations,
            binary: self.binary,
            outputs: self.outputs,
            factory: self.factory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::NullLogic;

    fn i2c() -> DecoderDescriptor {
        DecoderDescriptor::builder("i2c", NullLogic::factory())
            .with_longname("Inter-Integrated Circuit")
            .probe("scl", "SCL", "Serial clock line")
            .probe("sda", "SDA", "Serial data line")
            .optional_probe("int", "INT", "Interrupt line")
            .build()
            .unwrap()
    }

    #[test]
    fn test_probe_order_spans_required_then_optional() {
        let desc = i2c();
        assert_eq!(desc.num_probes(), 3);
        assert_eq!(desc.find_probe("scl").unwrap().order, 0);
        assert_eq!(desc.find_probe("sda").unwrap().order, 1);
        assert_eq!(desc.find_probe("int").unwrap().order, 2);
        assert!(desc.find_probe("nope").is_none());
    }

    #[test]
    fn test_names_default_from_id() {
        let desc = i2c();
        assert_eq!(desc.name(), "i2c");
        assert_eq!(desc.longname(), "Inter-Integrated Circuit");
        assert_eq!(desc.license(), "gplv2+");
    }

    #[test]
    fn test_duplicate_probe_rejected() {
        let result = DecoderDescriptor::builder("dup", NullLogic::factory())
            .probe("clk", "CLK", "")
            .optional_probe("clk", "CLK", "")
            .build();
        assert!(result.unwrap_err().to_string().contains("twice"));
    }

    #[test]
    fn test_reserved_option_id_rejected() {
        let result = DecoderDescriptor::builder("bad", NullLogic::factory())
            .option("id", "instance id", "x")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(DecoderDescriptor::builder("", NullLogic::factory()).build().is_err());
    }

    #[test]
    fn test_output_kinds_deduplicated() {
        let desc = DecoderDescriptor::builder("x", NullLogic::factory())
            .output(OutputKind::Annotation)
            .output(OutputKind::Annotation)
            .output(OutputKind::Binary)
            .build()
            .unwrap();
        assert_eq!(desc.output_kinds(), &[OutputKind::Annotation, OutputKind::Binary]);
    }
}
