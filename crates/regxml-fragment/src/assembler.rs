//! MXF fragment assembler.
//!
//! Orchestrates one partition byte stream end to end: partition pack,
//! primer pack, set index, root selection, fragment build. Structural
//! prerequisites are fatal and yield no fragment; everything else is
//! reported and survived.

use crate::builder::{AuidLabelResolver, FragmentBuilder};
use crate::xml::Fragment;
use regxml_dict::{DefinitionKind, DefinitionResolver};
use regxml_klv::{Auid, Group, KlvReader, Ul};
use regxml_mxf::{
    find_partition_pack, find_primer_pack, read_set_index, Event, EventCode, EventHandler,
    SetIndex, Set,
};

/// Preface set key.
pub const PREFACE_UL: Ul = Ul::new([
    0x06, 0x0e, 0x2b, 0x34, 0x02, 0x7f, 0x01, 0x01, //
    0x0d, 0x01, 0x01, 0x01, 0x01, 0x01, 0x2f, 0x00,
]);

/// True if the set's class, or any of its ancestors, matches the
/// requested class under normalized equality.
fn is_instance_of(defs: &dyn DefinitionResolver, key: &Auid, superclass: &Auid) -> bool {
    let mut current = *key;
    loop {
        let Some(def) = defs.definition(&current) else {
            return false;
        };
        if !def.is_class() {
            return false;
        }
        if def.identification().normalized_eq(superclass) {
            return true;
        }
        match &def.kind {
            DefinitionKind::Class {
                parent_class: Some(parent),
                ..
            } => current = *parent,
            _ => return false,
        }
    }
}

fn select_root<'a>(
    index: &'a SetIndex,
    defs: &dyn DefinitionResolver,
    root_class: Option<&Auid>,
) -> Option<&'a Set> {
    match root_class {
        None => {
            let preface = Auid::from(PREFACE_UL);
            index.values().find(|s| s.key().normalized_eq(&preface))
        }
        Some(class) => index
            .values()
            .find(|s| is_instance_of(defs, s.key(), class)),
    }
}

/// Builds the RegXML fragment of the partition starting at `data`.
///
/// Scans to the partition pack (discarding whatever precedes it),
/// reads the primer, indexes the header sets, then runs the fragment
/// builder from the root set: the first Preface instance, or the
/// first instance of `root_class` when one is given. Returns `None`
/// after a fatal event.
pub fn build_fragment(
    data: &[u8],
    defs: &dyn DefinitionResolver,
    labels: Option<&dyn AuidLabelResolver>,
    root_class: Option<&Auid>,
    handler: &mut dyn EventHandler,
) -> Option<Fragment> {
    let mut reader = KlvReader::big_endian(data);

    let pack = match find_partition_pack(&mut reader) {
        Ok(Some(pack)) => pack,
        Ok(None) => {
            handler.handle(Event::fatal(
                EventCode::MissingHeaderPartitionPack,
                "no partition pack before the end of the stream",
                String::new(),
            ));
            return None;
        }
        Err(e) => {
            handler.handle(Event::fatal(
                EventCode::BadHeaderPartitionPack,
                e.to_string(),
                String::new(),
            ));
            return None;
        }
    };

    // Header metadata is counted from here.
    let base = reader.position();

    let primer = match find_primer_pack(&mut reader) {
        Ok(Some(primer)) => primer,
        Ok(None) => {
            handler.handle(Event::fatal(
                EventCode::MissingPrimerPack,
                "no primer pack before the end of the stream",
                String::new(),
            ));
            return None;
        }
        Err(e) => {
            handler.handle(Event::fatal(
                EventCode::BadPrimerPack,
                e.to_string(),
                String::new(),
            ));
            return None;
        }
    };

    let index = read_set_index(&mut reader, &primer, pack.header_byte_count, base, handler);

    tracing::debug!(
        sets = index.len(),
        header_byte_count = pack.header_byte_count,
        "assembling fragment"
    );

    let Some(root) = select_root(&index, defs, root_class) else {
        let wanted = match root_class {
            Some(class) => class.to_string(),
            None => Auid::from(PREFACE_UL).to_string(),
        };
        handler.handle(Event::fatal(
            EventCode::RootSetNotFound,
            format!("no set of class {wanted} in the header metadata"),
            String::new(),
        ));
        return None;
    };

    let mut builder = FragmentBuilder::new(defs, &index, labels);
    Some(builder.build(root, handler))
}
