//! HTML for the home and stream pages.
//!
//! Both stream page variants are fixed at compile time; choosing one is a pure
//! function of the validated request.

use crate::page::Player;
use crate::page::StreamOption;
use crate::page::StreamRequest;
use std::fmt::Write;

pub fn render_home(options: &[StreamOption]) -> String {
    let mut links = String::new();
    for option in options {
        let [legacy_origin, legacy_cache, current_origin, current_cache] = option.links();
        let caption = format!(
            "From {}, cached at {}",
            escape_html(&option.origin_name),
            escape_html(&option.cache_name)
        );
        // Writing to a `String` cannot fail.
        let _ = write!(
            links,
            r#"
    <a href="{}">[oldjs-pointing to origin]{caption}</a>
    <br />
    <a href="{}">[oldjs-pointing to cache]{caption}</a>
    <br />
    <a href="{}">[newjs-pointing to origin]{caption}</a>
    <br />
    <a href="{}">[newjs-pointing to cache]{caption}</a>
    <br />"#,
            escape_html(&legacy_origin.href()),
            escape_html(&legacy_cache.href()),
            escape_html(&current_origin.href()),
            escape_html(&current_cache.href()),
        );
    }
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset=utf-8 />
<title>Coordinator home page</title>
<meta http-equiv="X-UA-Compatible" content="IE=edge">
<meta name="description" content="video livestream url">
<meta name="viewport" content="width=device-width,initial-scale=1.0">
</head>
<body>
  <h1>Home page</h1>
  <h3>Live streams available right now:</h3>
  <p>{links}
  </p>
</body>
</html>
"#
    )
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StreamTemplate {
    /// videojs 5 with the hls.js P2P plugin.
    Legacy,

    /// Current videojs with its bundled HLS support.
    Current,
}

impl StreamTemplate {
    pub fn select(request: &StreamRequest) -> Self {
        match request.player {
            Player::Legacy => StreamTemplate::Legacy,
            Player::Current => StreamTemplate::Current,
        }
    }

    pub fn render(self, request: &StreamRequest) -> String {
        let manifest_url = request.manifest_url();
        match self {
            StreamTemplate::Legacy => legacy_stream_page(&escape_html(&manifest_url)),
            StreamTemplate::Current => current_stream_page(&escape_js(&manifest_url)),
        }
    }
}

fn legacy_stream_page(manifest_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>CDNBye videojs5 demo</title>
</head>
<link href="/static/css/video-js.min.css" rel="stylesheet">
<script src="/static/js/video.min.js"></script>
<script src="/static/js/videojs-contrib-media-sources.min.js"></script>
<script src="/static/js/cdnbye.js"></script>
<script src="/static/js/videojs-contrib-hlsjs.min.js"></script>

<body>
<div id="main">
    <video id="player" class="video-js vjs-default-skin" height="360" width="640" controls preload="none">
        <source src="{manifest_url}" type="application/x-mpegURL"/>
    </video>
    <p id="version"></p>
    <h3>download info:</h3>
    <p id="info"></p>
</div>
<script>
    var player = videojs('#player', {{
        autoplay: true,
        html5: {{
            hlsjsConfig: {{
                debug: true,
                p2pConfig: {{
                    logLevel: true,
                    live: false
                }}
            }}
        }}
    }});
</script>
</body>
</html>
"#
    )
}

fn current_stream_page(manifest_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset=utf-8 />
<title>Video live stream</title>
<meta http-equiv="X-UA-Compatible" content="IE=edge">
<meta name="description" content="video livestream url">
<meta name="viewport" content="width=device-width,initial-scale=1.0">
  <link href="/static/css/video-js.css" rel="stylesheet">
</head>
<body>
  <h1>Video.js Example Embed</h1>
  <video id="player" class="video-js" controls preload="auto" width="640" height="268">
  </video>
  <script src="/static/js/video.js"></script>
  <script>
    var player = videojs('player', {{
      autoplay: true,
      html5: {{
        nativeAudioTracks: false,
        nativeVideoTracks: false,
        hls: {{
          overrideNative: true
        }}
      }}
    }});
    player.src({{
      src: '{manifest_url}',
      type: 'application/x-mpegURL'
    }})
  </script>
</body>
</html>
"#
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escapes text for a single-quoted JavaScript string inside a `<script>` element.
fn escape_js(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '\'' | '"' | '<' | '>' | '&' | '\n' | '\r' => {
                let _ = write!(escaped, "\\u{:04X}", c as u32);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::page::Target;

    fn request(player: Player, prefix: &str) -> StreamRequest {
        StreamRequest {
            target: Target::Cache("10.0.0.1:8080".into()),
            prefix: prefix.into(),
            player,
        }
    }

    #[test]
    fn select_template() {
        assert_eq!(
            StreamTemplate::select(&request(Player::Legacy, "live1")),
            StreamTemplate::Legacy
        );
        assert_eq!(
            StreamTemplate::select(&request(Player::Current, "live1")),
            StreamTemplate::Current
        );
    }

    #[test]
    fn both_variants_embed_the_manifest() {
        for player in [Player::Legacy, Player::Current] {
            let request = request(player, "live1");
            let page = StreamTemplate::select(&request).render(&request);
            assert!(page.contains("//10.0.0.1:8080/live1_playlist.m3u8"));
        }
    }

    #[test]
    fn variants_differ() {
        let legacy = StreamTemplate::Legacy.render(&request(Player::Legacy, "live1"));
        let current = StreamTemplate::Current.render(&request(Player::Current, "live1"));
        assert!(legacy.contains("cdnbye.js"));
        assert!(!current.contains("cdnbye.js"));
    }

    #[test]
    fn prefix_cannot_break_out_of_script() {
        let page = StreamTemplate::Current.render(&request(Player::Current, "x'</script>"));
        assert!(!page.contains("x'</script>"));
        assert!(page.contains(r"x\u0027\u003C/script\u003E_playlist.m3u8"));
    }

    #[test]
    fn home_escapes_names() {
        let option = StreamOption {
            origin: "10.0.0.1:1935".into(),
            origin_name: "<b>studio</b>".into(),
            prefix: "live1".into(),
            cache: "10.0.0.2:8080".into(),
            cache_name: "edge".into(),
        };

        // When
        let page = render_home(&[option]);

        // Then
        assert!(page.contains("From &lt;b&gt;studio&lt;/b&gt;, cached at edge"));
        assert!(page.contains(
            r#"<a href="/stream?prefix=live1&amp;cache=10.0.0.2%3A8080&amp;old=false">"#
        ));
    }

    #[test]
    fn empty_home() {
        let page = render_home(&[]);
        assert!(page.contains("Live streams available right now"));
        assert!(!page.contains("<a "));
    }
}
