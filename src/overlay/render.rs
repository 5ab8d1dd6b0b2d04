use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::OverlayStyle;
use super::engine::{Alignment, TextBlock};

const REGION_COLOR: &str = "#00c853";
const RESOLVED_COLOR: &str = "#2962ff";
const UNRESOLVED_COLOR: &str = "#d50000";

fn open_svg(svg: &mut String, image_bytes: &[u8], image_mime: &str, width: u32, height: u32) {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));
}

/// Draw every visible block's wrapped lines over the canvas image.
pub fn render_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    blocks: &[TextBlock],
    style: &OverlayStyle,
) -> Result<String> {
    let mut svg = String::new();
    open_svg(&mut svg, image_bytes, image_mime, width, height);

    let font_family = style
        .font_family
        .as_deref()
        .or_else(|| style.font_metrics.as_ref().and_then(|m| m.family()));

    for block in blocks.iter().filter(|block| !block.is_empty()) {
        let bbox = block.final_bbox();
        let stroke = block.stroke_width() as f32;
        let font_size = block.font_size() as f32;
        let (anchor, x) = match style.alignment {
            Alignment::Left => ("start", bbox.x1 + stroke),
            Alignment::Center => ("middle", bbox.center().x),
            Alignment::Right => ("end", bbox.x2 - stroke),
        };
        let color = block.color().unwrap_or(&style.text_color);
        let family_attr = font_family
            .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
            .unwrap_or_default();

        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{fill}" stroke="{stroke_color}" stroke-width="{stroke_width}" stroke-linejoin="round" paint-order="stroke" text-anchor="{anchor}"{family}>"#,
            x = x,
            y = bbox.y1 + stroke + font_size,
            size = font_size,
            fill = escape_xml(color),
            stroke_color = escape_xml(&style.stroke_color),
            stroke_width = stroke * 2.0,
            anchor = anchor,
            family = family_attr
        ));
        let line_height = font_size + block.line_spacing() as f32;
        for (idx, line) in block.wrapped_lines().iter().enumerate() {
            let escaped = escape_xml(line);
            if idx == 0 {
                svg.push_str(&format!(r#"<tspan x="{x}">{text}</tspan>"#, x = x, text = escaped));
            } else {
                svg.push_str(&format!(
                    r#"<tspan x="{x}" dy="{dy}">{text}</tspan>"#,
                    x = x,
                    dy = line_height,
                    text = escaped
                ));
            }
        }
        svg.push_str("</text>");
    }

    svg.push_str("</svg>");
    Ok(svg)
}

/// Original regions plus final text boxes, unresolved ones in red.
pub fn render_debug_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    blocks: &[TextBlock],
) -> Result<String> {
    let mut svg = String::new();
    open_svg(&mut svg, image_bytes, image_mime, width, height);

    for block in blocks {
        let region = block.region().rect();
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{color}" stroke-width="1" stroke-dasharray="4 2"/>"#,
            x = region.x1,
            y = region.y1,
            w = region.width(),
            h = region.height(),
            color = REGION_COLOR
        ));
        if block.is_empty() {
            continue;
        }
        let bbox = block.final_bbox();
        let color = if block.resolved() {
            RESOLVED_COLOR
        } else {
            UNRESOLVED_COLOR
        };
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{color}" stroke-width="2"/>"#,
            x = bbox.x1,
            y = bbox.y1,
            w = bbox.width(),
            h = bbox.height(),
            color = color
        ));
    }

    svg.push_str("</svg>");
    Ok(svg)
}

pub fn render_svg_bytes(svg: &str, output_mime: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    // JPEG has no alpha channel
    let image = if format == image::ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(image::DynamicImage::ImageRgba8(image).to_rgb8())
    } else {
        image::DynamicImage::ImageRgba8(image)
    };
    image
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

pub fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/gif" => Some(image::ImageFormat::Gif),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::engine::{LayoutConfig, LayoutRequest, Region, layout_text};

    fn blocks(texts: &[&str]) -> Vec<TextBlock> {
        let regions: Vec<Region> = (0..texts.len() as i32)
            .map(|idx| Region::new(20, 20 + idx * 60, 220, 60 + idx * 60))
            .collect();
        let texts: Vec<String> = texts.iter().map(|text| text.to_string()).collect();
        let request = LayoutRequest::new(400, 300, &regions, &texts);
        layout_text(&request, &LayoutConfig::default(), None)
            .unwrap()
            .blocks
    }

    #[test]
    fn empty_layout_keeps_only_the_canvas() {
        let svg = render_svg(b"png", "image/png", 10, 10, &[], &OverlayStyle::default()).unwrap();
        assert!(svg.contains("data:image/png;base64,cG5n"));
        assert!(!svg.contains("<text"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn text_is_stroked_and_escaped() {
        let blocks = blocks(&["Fish & <Chips>"]);
        let svg = render_svg(b"", "image/png", 400, 300, &blocks, &OverlayStyle::default()).unwrap();
        assert!(svg.contains(r#"paint-order="stroke""#));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.contains("Fish &amp; &lt;Chips&gt;"));
        assert!(svg.contains(r##"stroke="#ffffff""##));
    }

    #[test]
    fn block_color_overrides_style() {
        let mut blocks = blocks(&["hello"]);
        blocks[0].color = Some("#123456".to_string());
        let svg = render_svg(b"", "image/png", 400, 300, &blocks, &OverlayStyle::default()).unwrap();
        assert!(svg.contains(r##"fill="#123456""##));
    }

    #[test]
    fn debug_svg_draws_regions_and_boxes() {
        let blocks = blocks(&["one", "two"]);
        let svg = render_debug_svg(b"", "image/png", 400, 300, &blocks).unwrap();
        assert_eq!(svg.matches(REGION_COLOR).count(), 2);
        assert_eq!(svg.matches(RESOLVED_COLOR).count(), 2);
        assert!(!svg.contains(UNRESOLVED_COLOR));
    }

    #[test]
    fn rasterises_plain_svg_to_png() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"><rect width="4" height="4" fill="#ff0000"/></svg>"##;
        let bytes = render_svg_bytes(svg, "image/png", None).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn unknown_output_mime_is_rejected() {
        assert!(image_format_from_mime("image/x-unknown").is_none());
        assert!(render_svg_bytes("<svg/>", "text/plain", None).is_err());
    }
}
