use {
    crate::{
        channel::{Channel, Direction, PrimitiveKind},
        error::{invalid_literal, missing_version, Result},
        Serialize,
    },
    core::mem,
};

const CLASS_VERSION_LABEL: &str = "class-version";
const CLASS_NAME_LABEL: &str = "class_name";

/// Transfer a class name and version as one `name-version` tag.
///
/// Serializing in overwrites both from the tag and splits it at the last
/// `-`, so names may themselves contain dashes. Returns the version.
pub fn serialize_class_version<C>(channel: &mut C, name: &mut String, version: &mut f32) -> Result<f32>
where
    C: Channel + ?Sized,
{
    let mut tag = match channel.direction() {
        Direction::Out => format!("{name}-{version}"),
        Direction::In => String::new(),
    };
    tag.serialize(channel, CLASS_VERSION_LABEL)?;
    if channel.direction() == Direction::In {
        let (tag_name, tag_version) = tag
            .rsplit_once('-')
            .ok_or_else(|| missing_version(&tag))?;
        *version = tag_version
            .parse()
            .map_err(|_| invalid_literal(tag_version, PrimitiveKind::F32))?;
        *name = tag_name.to_owned();
    }
    Ok(*version)
}

/// Transfer a bare class name.
pub fn serialize_class_name<C>(channel: &mut C, name: &mut String) -> Result<()>
where
    C: Channel + ?Sized,
{
    let mut tag = mem::take(name);
    let result = tag.serialize(channel, CLASS_NAME_LABEL);
    *name = tag;
    result
}
