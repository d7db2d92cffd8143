//! The libvirt-shaped description of the physical machine that virt-v2v
//! reads with `-i libvirtxml`.

use std::path::Path;

use config::Config;
use config::host::mac_address;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Name of the uploaded description.
pub const PHYSICAL_XML: &str = "physical.xml";

const NOTE: &str = " NOTE!

  This file is generated by virt-p2v to describe the physical machine
  to virt-v2v on the conversion server. It is a minimal description,
  not a libvirt domain: if the conversion targets libvirt, virt-v2v
  writes the real domain XML itself.

  Do not try to load this XML into libvirt. ";

// Longest disk name used verbatim as a target device.
const MAX_TARGET_DEV: usize = 63;

/// Writes the description of the machine in `config`, whose disks are
/// reachable on the conversion server at `remote_ports` (one per disk, in
/// order). MAC addresses are read from `sys_class_net`.
pub fn physical_xml(
    config: &Config,
    remote_ports: &[u16],
    sys_class_net: &Path,
) -> Result<Vec<u8>, quick_xml::Error> {
    let mut xml = XmlWriter::new();
    xml.writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    xml.writer
        .write_event(Event::Comment(BytesText::from_escaped(NOTE)))?;

    let memory_kib = (config.memory / 1024).to_string();
    xml.start("domain", &[("type", "physical")])?;
    xml.text_element("name", &[], &config.guestname)?;
    xml.text_element("memory", &[("unit", "KiB")], &memory_kib)?;
    xml.text_element("currentMemory", &[("unit", "KiB")], &memory_kib)?;
    xml.text_element("vcpu", &[], &config.vcpus.to_string())?;

    xml.start("os", &[])?;
    xml.text_element("type", &[("arch", std::env::consts::ARCH)], "hvm")?;
    xml.end("os")?;

    let flags = config.cpu_flags;
    if flags.acpi || flags.apic || flags.pae {
        xml.start("features", &[])?;
        for (set, name) in [(flags.acpi, "acpi"), (flags.apic, "apic"), (flags.pae, "pae")] {
            if set {
                xml.empty(name, &[])?;
            }
        }
        xml.end("features")?;
    }

    xml.start("devices", &[])?;
    for (index, (disk, port)) in config.disks.iter().zip(remote_ports).enumerate() {
        let dev = target_dev(disk, index);
        let port = port.to_string();
        xml.start("disk", &[("type", "network"), ("device", "disk")])?;
        xml.empty("driver", &[("name", "qemu"), ("type", "raw")])?;
        xml.start("source", &[("protocol", "nbd")])?;
        xml.empty("host", &[("name", "localhost"), ("port", &port)])?;
        xml.end("source")?;
        xml.empty("target", &[("dev", &dev)])?;
        xml.end("disk")?;
    }

    for removable in &config.removable {
        xml.start("disk", &[("type", "network"), ("device", "cdrom")])?;
        xml.empty("driver", &[("name", "qemu"), ("type", "raw")])?;
        xml.empty("target", &[("dev", removable)])?;
        xml.end("disk")?;
    }

    for interface in &config.interfaces {
        let network = config.network_map.network_for(interface);
        xml.start("interface", &[("type", "network")])?;
        xml.empty("source", &[("network", network)])?;
        xml.empty("target", &[("dev", interface)])?;
        if let Some(mac) = mac_address(sys_class_net, interface) {
            xml.empty("mac", &[("address", &mac)])?;
        }
        xml.end("interface")?;
    }
    xml.end("devices")?;
    xml.end("domain")?;

    let mut bytes = xml.writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Guest device name for disk number `index`: its own name when it is a
/// plain device name, otherwise `sd` plus a drive letter.
pub(crate) fn target_dev(disk: &str, index: usize) -> String {
    if disk.starts_with('/') || disk.len() > MAX_TARGET_DEV {
        format!("sd{}", drive_name(index))
    } else {
        disk.to_owned()
    }
}

/// `a` .. `z`, `aa` .. `az`, `ba` ... as Linux names disks.
pub(crate) fn drive_name(index: usize) -> String {
    let mut name = Vec::new();
    let mut n = index;
    loop {
        name.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), quick_xml::Error> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), quick_xml::Error> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), quick_xml::Error> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> Result<(), quick_xml::Error> {
        self.start(name, attributes)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }
}
