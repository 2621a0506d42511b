//! Terminal output helpers. Rendering only; all decisions happen in the
//! engine.

use bytesize::ByteSize;

use crate::crypto::suite::supported_algorithms;
use crate::engine::{Inspection, RunReport};
use crate::progress::Status;

pub mod progress;

pub fn show_report(report: &RunReport) {
    match report.status {
        Status::Success => {
            println!("✓ {} [{}]", report.message, report.status_label);
            for warning in &report.warnings {
                eprintln!("  ⚠ {warning}");
            }
        }
        _ => eprintln!("✗ {} [{}]", report.message, report.status_label),
    }
}

pub fn show_inspection(path: &std::path::Path, size: u64, inspection: &Inspection) {
    let suite = &inspection.suite;
    println!("{}", path.display());
    println!("  size:       {}", ByteSize::b(size));
    println!("  version:    {}", inspection.version.number());
    println!("  cipher:     {}", suite.cipher);
    println!("  hash:       {}", suite.hash);
    println!("  mode:       {}", suite.mode);
    println!("  mac:        {}", suite.mac);
    println!("  kdf rounds: {}", suite.kdf_iterations);
    println!("  fec frame:  {}", if inspection.fec_framed { "yes" } else { "no" });
}

pub fn show_algorithms() {
    let set = supported_algorithms();
    println!("ciphers: {}", set.ciphers.join(", "));
    println!("hashes:  {}", set.hashes.join(", "));
    println!("modes:   {}", set.modes.join(", "));
    println!("macs:    {}", set.macs.join(", "));
}
