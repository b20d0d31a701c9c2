use compute_api::ImageReference;
use tracing::warn;

use crate::types::Image;
use crate::{Error, Result};

/// Turn a declarative image descriptor into a reference the compute API accepts.
///
/// Resolution order: explicit `id`, then shared-gallery coordinates, then the
/// marketplace `publisher`/`offer`/`sku`/`version` triple.
pub fn resolve_image_reference(image: &Image) -> Result<ImageReference> {
    let Some(name) = image.name.as_ref() else {
        return Err(Error::InvalidImageSpec("missing image reference".into()));
    };

    let mut image_ref = ImageReference {
        name: Some(name.clone()),
        ..Default::default()
    };

    if let Some(id) = &image.id {
        image_ref.id = Some(id.clone());
        return Ok(image_ref);
    }

    if image.subscription_id.is_some()
        && image.resource_group.is_some()
        && image.gallery.is_some()
        && image.version.is_some()
    {
        // the gallery image may not be published, so the ID is all we send
        image_ref.id = Some(gallery_image_id(image)?);
        return Ok(image_ref);
    }

    image_ref.publisher = image.publisher.clone();
    image_ref.offer = image.offer.clone();
    image_ref.sku = image.sku.clone();

    if let Some(version) = &image.version {
        image_ref.version = Some(version.clone());
        if image_ref.publisher.is_none() && image_ref.offer.is_none() && image_ref.sku.is_none() {
            warn!(image = %name, version = %version, "marketplace image has no publisher, offer or sku");
        }
        return Ok(image_ref);
    }

    Err(Error::InvalidImageSpec(format!(
        "image reference cannot be generated, as fields are missing: {image_ref:?}"
    )))
}

/// Resource ID of an image version stored in a shared image gallery.
pub fn gallery_image_id(image: &Image) -> Result<String> {
    fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
        value.as_deref().ok_or_else(|| {
            Error::InvalidImageSpec(format!(
                "image {field} must be set when specifying an image from a shared image gallery"
            ))
        })
    }

    let subscription = required(&image.subscription_id, "subscription id")?;
    let resource_group = required(&image.resource_group, "resource group")?;
    let gallery = required(&image.gallery, "gallery")?;
    let name = required(&image.name, "name")?;
    let version = required(&image.version, "version")?;

    Ok(format!(
        "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.Compute/galleries/{gallery}/images/{name}/versions/{version}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery_image() -> Image {
        Image {
            subscription_id: Some("sub1".into()),
            resource_group: Some("rg1".into()),
            gallery: Some("gal1".into()),
            name: Some("img1".into()),
            version: Some("1.0.0".into()),
            ..Default::default()
        }
    }

    fn invalid_message(result: Result<impl std::fmt::Debug>) -> String {
        match result {
            Err(Error::InvalidImageSpec(msg)) => msg,
            other => panic!("expected InvalidImageSpec, got {other:?}"),
        }
    }

    #[test]
    fn explicit_id_wins() {
        let image = Image {
            id: Some("/images/custom".into()),
            publisher: Some("Canonical".into()),
            offer: Some("UbuntuServer".into()),
            sku: Some("22_04-lts".into()),
            ..gallery_image()
        };

        let image_ref = resolve_image_reference(&image).unwrap();
        assert_eq!(
            image_ref,
            ImageReference {
                name: Some("img1".into()),
                id: Some("/images/custom".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn gallery_tuple_composes_canonical_path() {
        let image_ref = resolve_image_reference(&gallery_image()).unwrap();
        assert_eq!(
            image_ref.id.as_deref(),
            Some(
                "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Compute/galleries/gal1/images/img1/versions/1.0.0"
            )
        );
        assert_eq!(image_ref.version, None);
        assert_eq!(image_ref.publisher, None);
    }

    #[test]
    fn missing_name_always_fails() {
        let candidates = [
            Image::default(),
            Image {
                name: None,
                ..gallery_image()
            },
            Image {
                id: Some("/images/custom".into()),
                ..Default::default()
            },
            Image {
                publisher: Some("Canonical".into()),
                offer: Some("UbuntuServer".into()),
                sku: Some("22_04-lts".into()),
                version: Some("latest".into()),
                ..Default::default()
            },
        ];

        for image in &candidates {
            assert_eq!(
                invalid_message(resolve_image_reference(image)),
                "missing image reference"
            );
        }
    }

    #[test]
    fn gallery_id_names_first_missing_field() {
        let cases: [(fn(&mut Image), &str); 5] = [
            (|i| i.subscription_id = None, "subscription id"),
            (|i| i.resource_group = None, "resource group"),
            (|i| i.gallery = None, "gallery"),
            (|i| i.name = None, "name"),
            (|i| i.version = None, "version"),
        ];

        for (clear, field) in cases {
            let mut image = gallery_image();
            clear(&mut image);
            let msg = invalid_message(gallery_image_id(&image));
            assert!(msg.starts_with(&format!("image {field} must be set")), "{msg}");
        }

        // subscription is checked before everything else
        let msg = invalid_message(gallery_image_id(&Image::default()));
        assert!(msg.starts_with("image subscription id"), "{msg}");
    }

    #[test]
    fn incomplete_gallery_falls_back_to_marketplace() {
        let image = Image {
            gallery: None,
            publisher: Some("Canonical".into()),
            ..gallery_image()
        };

        let image_ref = resolve_image_reference(&image).unwrap();
        assert_eq!(image_ref.id, None);
        assert_eq!(image_ref.publisher.as_deref(), Some("Canonical"));
        assert_eq!(image_ref.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn marketplace_triple_is_copied() {
        let image = Image {
            name: Some("ubuntu".into()),
            publisher: Some("Canonical".into()),
            offer: Some("UbuntuServer".into()),
            sku: Some("22_04-lts".into()),
            version: Some("latest".into()),
            ..Default::default()
        };

        assert_eq!(
            resolve_image_reference(&image).unwrap(),
            ImageReference {
                name: Some("ubuntu".into()),
                id: None,
                publisher: Some("Canonical".into()),
                offer: Some("UbuntuServer".into()),
                sku: Some("22_04-lts".into()),
                version: Some("latest".into()),
            }
        );
    }

    #[test]
    fn marketplace_accepts_version_alone() {
        let image = Image {
            name: Some("ubuntu".into()),
            version: Some("latest".into()),
            ..Default::default()
        };

        let image_ref = resolve_image_reference(&image).unwrap();
        assert_eq!(image_ref.version.as_deref(), Some("latest"));
        assert_eq!(image_ref.publisher, None);
    }

    #[test]
    fn marketplace_without_version_lists_set_fields() {
        let image = Image {
            name: Some("ubuntu".into()),
            publisher: Some("Canonical".into()),
            sku: Some("22_04-lts".into()),
            ..Default::default()
        };

        let msg = invalid_message(resolve_image_reference(&image));
        assert!(msg.contains("fields are missing"), "{msg}");
        assert!(msg.contains("Canonical"), "{msg}");
        assert!(msg.contains("22_04-lts"), "{msg}");
        assert!(msg.contains("version: None"), "{msg}");
    }
}
