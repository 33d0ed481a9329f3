//! # Attribute Trees
//!
//! The document parser hands the planner a tree of tagged nodes carrying
//! typed key/value attributes. This module turns such a tree into the typed
//! [`Chip`] and [`Project`] model.
//!
//! ```text
//! <chip name platform>
//!   <memory name kind start size attr [align]>    kind: code | data | device
//!   <vector name number>                          attr: letters of RWXBCS
//!   <option name value>
//!
//! <project name>
//!   <kernel code_base code_size data_base data_size kmem_base kmem_size
//!           [stack_size] [extra_captbl]>
//!   <runtime code_base code_size data_base data_size [stack_size] [extra_captbl]>
//!   <process name [data_reserve] [extra_captbl]>
//!     <segment kind base size attr [align]>
//!     <thread name entry stack_size [priority] [cap]>
//!     <invocation name entry stack_size [cap]>
//!     <port name process invocation [cap]>
//!     <receive name [cap]>
//!     <send name process receive [cap]>
//!     <vector name [cap]>
//! ```
//!
//! Addresses (`*_base`, `entry`) and capability slots (`cap`) accept
//! [`AttrValue::Auto`]; omitting them means the same.

use std::collections::BTreeMap;

use plan_frontier::CapRequest;
use plan_memory::MemAttr;
use plan_region::{MemoryRegion, RegionKind};

use crate::{
    Chip, ChipVector, InvocationDecl, KernelDecl, MemReq, ModelError, Place, PortDecl, ProcessDecl,
    Project, ReceiveDecl, RuntimeDecl, Segment, SendDecl, ThreadDecl, VectorDecl,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Int(u64),
    Str(String),
    /// Explicitly left to the planner.
    Auto,
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrNode {
    pub tag: String,
    pub attrs: BTreeMap<String, AttrValue>,
    pub children: Vec<AttrNode>,
}

impl AttrNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Children with the given tag, in document order.
    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    fn expect_tag(&self, expected: &'static str) -> Result<(), ModelError> {
        if self.tag == expected {
            Ok(())
        } else {
            Err(ModelError::UnexpectedTag {
                expected,
                found: self.tag.clone(),
            })
        }
    }

    fn only_child(&self, tag: &'static str) -> Result<&Self, ModelError> {
        let mut found = self.children_tagged(tag);
        match (found.next(), found.next()) {
            (Some(child), None) => Ok(child),
            _ => Err(ModelError::ChildCount {
                tag: self.tag.clone(),
                child: tag,
            }),
        }
    }

    fn wrong_type(&self, key: &'static str, expected: &'static str) -> ModelError {
        ModelError::WrongType {
            tag: self.tag.clone(),
            key,
            expected,
        }
    }

    fn invalid(&self, key: &'static str, value: impl ToString) -> ModelError {
        ModelError::InvalidValue {
            tag: self.tag.clone(),
            key,
            value: value.to_string(),
        }
    }

    fn required(&self, key: &'static str) -> Result<&AttrValue, ModelError> {
        self.attrs.get(key).ok_or_else(|| ModelError::MissingAttr {
            tag: self.tag.clone(),
            key,
        })
    }

    fn int(&self, key: &'static str) -> Result<u64, ModelError> {
        match self.required(key)? {
            AttrValue::Int(v) => Ok(*v),
            _ => Err(self.wrong_type(key, "an integer")),
        }
    }

    fn int_or(&self, key: &'static str, default: u64) -> Result<u64, ModelError> {
        match self.attrs.get(key) {
            None => Ok(default),
            Some(_) => self.int(key),
        }
    }

    fn u32(&self, key: &'static str) -> Result<u32, ModelError> {
        let v = self.int(key)?;
        u32::try_from(v).map_err(|_| self.invalid(key, v))
    }

    fn u32_or(&self, key: &'static str, default: u32) -> Result<u32, ModelError> {
        match self.attrs.get(key) {
            None => Ok(default),
            Some(_) => self.u32(key),
        }
    }

    fn str(&self, key: &'static str) -> Result<&str, ModelError> {
        match self.required(key)? {
            AttrValue::Str(s) => Ok(s),
            _ => Err(self.wrong_type(key, "a string")),
        }
    }

    fn place(&self, key: &'static str) -> Result<Place, ModelError> {
        match self.attrs.get(key) {
            None | Some(AttrValue::Auto) => Ok(Place::Auto),
            Some(AttrValue::Int(v)) => Ok(Place::Fixed(*v)),
            Some(AttrValue::Str(_)) => Err(self.wrong_type(key, "an address or auto")),
        }
    }

    fn cap(&self) -> Result<CapRequest, ModelError> {
        match self.attrs.get("cap") {
            None | Some(AttrValue::Auto) => Ok(CapRequest::Auto),
            Some(AttrValue::Int(v)) => u32::try_from(*v)
                .map(CapRequest::Fixed)
                .map_err(|_| self.invalid("cap", v)),
            Some(AttrValue::Str(_)) => Err(self.wrong_type("cap", "a slot index or auto")),
        }
    }

    fn mem_attr(&self, key: &'static str) -> Result<MemAttr, ModelError> {
        let text = self.str(key)?;
        parse_mem_attr(text).ok_or_else(|| self.invalid(key, text))
    }

    fn region_kind(&self) -> Result<RegionKind, ModelError> {
        match self.str("kind")? {
            "code" => Ok(RegionKind::Code),
            "data" => Ok(RegionKind::Data),
            "device" => Ok(RegionKind::Device),
            other => Err(self.invalid("kind", other)),
        }
    }

    fn mem_req(
        &self,
        base: &'static str,
        size: &'static str,
        attr: MemAttr,
    ) -> Result<MemReq, ModelError> {
        Ok(MemReq {
            place: self.place(base)?,
            size: self.int(size)?,
            align: self.int_or("align", 0)?,
            attr,
        })
    }
}

/// Parses an attribute string made of the letters `RWXBCS` (any order,
/// case-insensitive, `-` ignored).
#[must_use]
pub fn parse_mem_attr(text: &str) -> Option<MemAttr> {
    let mut attr = MemAttr::new();
    for c in text.chars() {
        attr = match c.to_ascii_uppercase() {
            'R' => attr.with_read(true),
            'W' => attr.with_write(true),
            'X' => attr.with_execute(true),
            'B' => attr.with_bufferable(true),
            'C' => attr.with_cacheable(true),
            'S' => attr.with_static_only(true),
            '-' => attr,
            _ => return None,
        };
    }
    Some(attr)
}

impl TryFrom<&AttrNode> for Chip {
    type Error = ModelError;

    fn try_from(node: &AttrNode) -> Result<Self, Self::Error> {
        node.expect_tag("chip")?;
        let mut chip = Self::new(node.str("name")?, node.str("platform")?.parse()?);

        for mem in node.children_tagged("memory") {
            let region = MemoryRegion::new(
                mem.str("name")?,
                mem.region_kind()?,
                mem.int("start")?,
                mem.int("size")?,
                mem.mem_attr("attr")?,
            );
            let region = match mem.attrs.get("align") {
                Some(_) => region.with_align(mem.int("align")?),
                None => region,
            };
            chip.regions.push(region);
        }
        for vec in node.children_tagged("vector") {
            chip.vectors
                .push(ChipVector::new(vec.str("name")?, vec.u32("number")?));
        }
        for opt in node.children_tagged("option") {
            chip.options
                .insert(opt.str("name")?.to_owned(), opt.str("value")?.to_owned());
        }
        Ok(chip)
    }
}

impl TryFrom<&AttrNode> for Project {
    type Error = ModelError;

    fn try_from(node: &AttrNode) -> Result<Self, Self::Error> {
        node.expect_tag("project")?;

        let k = node.only_child("kernel")?;
        let kernel = KernelDecl {
            code: k.mem_req("code_base", "code_size", MemAttr::RX)?,
            data: k.mem_req("data_base", "data_size", MemAttr::RW)?,
            stack_size: k.int_or("stack_size", 0)?,
            kmem: k.mem_req("kmem_base", "kmem_size", MemAttr::RW)?,
            extra_captbl: k.u32_or("extra_captbl", 0)?,
        };

        let r = node.only_child("runtime")?;
        let runtime = RuntimeDecl {
            code: r.mem_req("code_base", "code_size", MemAttr::RX)?,
            data: r.mem_req("data_base", "data_size", MemAttr::RW)?,
            stack_size: r.int_or("stack_size", 0)?,
            extra_captbl: r.u32_or("extra_captbl", 0)?,
        };

        let processes = node
            .children_tagged("process")
            .map(process_from)
            .collect::<Result<_, _>>()?;

        Ok(Self {
            name: node.str("name")?.to_owned(),
            kernel,
            runtime,
            processes,
        })
    }
}

fn process_from(node: &AttrNode) -> Result<ProcessDecl, ModelError> {
    let mut proc = ProcessDecl::new(node.str("name")?);
    proc.data_reserve = node.int_or("data_reserve", 0)?;
    proc.extra_captbl = node.u32_or("extra_captbl", 0)?;

    for c in &node.children {
        match c.tag.as_str() {
            "segment" => proc.segments.push(Segment {
                kind: c.region_kind()?,
                req: c.mem_req("base", "size", c.mem_attr("attr")?)?,
            }),
            "thread" => proc.threads.push(ThreadDecl {
                name: c.str("name")?.to_owned(),
                entry: c.place("entry")?,
                stack_size: c.int("stack_size")?,
                priority: c.u32_or("priority", 0)?,
                cap: c.cap()?,
            }),
            "invocation" => proc.invocations.push(InvocationDecl {
                name: c.str("name")?.to_owned(),
                entry: c.place("entry")?,
                stack_size: c.int("stack_size")?,
                cap: c.cap()?,
            }),
            "port" => proc.ports.push(PortDecl {
                name: c.str("name")?.to_owned(),
                process: c.str("process")?.to_owned(),
                invocation: c.str("invocation")?.to_owned(),
                cap: c.cap()?,
            }),
            "receive" => proc.receives.push(ReceiveDecl {
                name: c.str("name")?.to_owned(),
                cap: c.cap()?,
            }),
            "send" => proc.sends.push(SendDecl {
                name: c.str("name")?.to_owned(),
                process: c.str("process")?.to_owned(),
                receive: c.str("receive")?.to_owned(),
                cap: c.cap()?,
            }),
            "vector" => proc.vectors.push(VectorDecl {
                name: c.str("name")?.to_owned(),
                cap: c.cap()?,
            }),
            other => {
                return Err(ModelError::UnexpectedTag {
                    expected: "process item",
                    found: other.to_owned(),
                });
            }
        }
    }
    Ok(proc)
}
