//! Pick one not-yet-posted image from a remote folder and post it.
//!
//! Posted images are remembered by content hash under
//! `account_data.<account>.image_hashes` in the store, so the same file
//! is never reposted to an account, even across restarts or when two
//! invocations of the same task overlap.

use async_trait::async_trait;
use postpilot_channels::dropbox::RemoteFile;
use postpilot_core::config::{Config, TaskDefinition};
use postpilot_core::error::{PostPilotError, Result};
use postpilot_store::Store;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Action, ActionContext};

const IMAGE_EXTENSIONS: [&str; 2] = [".jpg", ".jpeg"];
const DEFAULT_HASHTAG_COUNT: usize = 5;

/// The built-in image posting action.
pub struct UploadImage;

/// Number of hashtags per caption: fixed, or sampled from a range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HashtagCount {
    Fixed(usize),
    Range([usize; 2]),
}

impl HashtagCount {
    fn pick(&self, rng: &mut impl Rng) -> usize {
        match self {
            Self::Fixed(n) => *n,
            Self::Range([lo, hi]) => rng.gen_range(*lo..=(*hi).max(*lo)),
        }
    }
}

/// Validated static arguments, as produced by `load_from_config` and
/// read back at execute time from the merged args.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadImageArgs {
    pub images_folder: String,
    pub hashtags: Vec<String>,
    pub hashtag_count: HashtagCount,
}

#[async_trait]
impl Action for UploadImage {
    fn name(&self) -> &str {
        "upload_image"
    }

    fn load_from_config(&self, config: &Config, task_def: &TaskDefinition) -> Result<Value> {
        let images_folder = task_def
            .params
            .get("images_folder")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PostPilotError::Config("images folder not specified".into()))?;

        let group_name = task_def
            .params
            .get("hashtag_group")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PostPilotError::Config("hashtag group name not specified".into()))?;

        let hashtags = config
            .hashtag_groups
            .get(group_name)
            .ok_or_else(|| {
                PostPilotError::Config(format!("hashtag group not found: {group_name}"))
            })?;

        let hashtag_count: HashtagCount = match task_def.params.get("hashtag_count") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| PostPilotError::Config(format!("invalid hashtag_count: {e}")))?,
            None => HashtagCount::Fixed(DEFAULT_HASHTAG_COUNT),
        };

        Ok(json!({
            "images_folder": images_folder,
            "hashtags": hashtags,
            "hashtag_count": hashtag_count,
        }))
    }

    async fn execute(&self, ctx: &ActionContext, store: &Store) -> Result<()> {
        let args: UploadImageArgs = serde_json::from_value(ctx.args.clone())?;

        let posted = store.get(
            ["account_data", ctx.account_name.as_str(), "image_hashes"],
            json!({}),
        );

        let files = ctx.files.list_files(&args.images_folder).await?;
        let image = select_image(&files, &posted).ok_or_else(|| {
            PostPilotError::Task(format!(
                "all images in {} were already posted to {}",
                args.images_folder, ctx.account_name
            ))
        })?;

        tracing::debug!("fetching image: {}", image.path);
        let bytes = ctx.files.download_file(&image.path).await?;

        let caption = generate_caption(&args.hashtags, &args.hashtag_count);
        tracing::info!("posting {} as {}: {}", image.path, ctx.account_name, caption);
        let media = ctx.session.upload_photo(bytes, &caption).await?;
        tracing::debug!("published media {}", media.media_id);

        store.set(
            [
                "account_data",
                ctx.account_name.as_str(),
                "image_hashes",
                image.content_hash.as_str(),
            ],
            json!(true),
        );
        Ok(())
    }
}

/// First listed image whose extension matches and whose content hash has
/// not been posted yet.
pub fn select_image<'a>(files: &'a [RemoteFile], posted: &Value) -> Option<&'a RemoteFile> {
    files
        .iter()
        .filter(|f| has_image_extension(&f.path))
        .find(|f| {
            !posted
                .get(&f.content_hash)
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
}

fn has_image_extension(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Caption is N hashtags sampled without replacement, space separated.
pub fn generate_caption(tags: &[String], count: &HashtagCount) -> String {
    let mut rng = rand::thread_rng();
    let n = count.pick(&mut rng).min(tags.len());
    tags.choose_multiple(&mut rng, n)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use postpilot_core::config::Config;

    fn remote(path: &str, hash: &str) -> RemoteFile {
        RemoteFile {
            path: path.to_string(),
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_select_skips_already_posted_hashes() {
        let files = vec![remote("/photos/a.jpg", "h1"), remote("/photos/b.jpg", "h2")];
        let posted = json!({"h1": true});

        let image = select_image(&files, &posted).expect("one candidate left");
        assert_eq!(image.content_hash, "h2");
    }

    #[test]
    fn test_select_ignores_non_image_files() {
        let files = vec![
            remote("/photos/readme.txt", "h1"),
            remote("/photos/b.jpeg", "h2"),
        ];
        let image = select_image(&files, &json!({})).expect("jpeg found");
        assert_eq!(image.path, "/photos/b.jpeg");
    }

    #[test]
    fn test_select_exhausted_folder_yields_none() {
        let files = vec![remote("/photos/a.jpg", "h1")];
        let posted = json!({"h1": true});
        assert!(select_image(&files, &posted).is_none());
    }

    #[test]
    fn test_select_takes_first_eligible() {
        let files = vec![remote("/photos/a.jpg", "h1"), remote("/photos/b.jpg", "h2")];
        let image = select_image(&files, &json!({})).expect("candidate");
        assert_eq!(image.content_hash, "h1");
    }

    #[test]
    fn test_caption_sampling_respects_count() {
        let tags: Vec<String> = ["#a", "#b", "#c", "#d"].iter().map(|s| s.to_string()).collect();
        let caption = generate_caption(&tags, &HashtagCount::Fixed(2));
        assert_eq!(caption.split_whitespace().count(), 2);
        for tag in caption.split_whitespace() {
            assert!(tags.iter().any(|t| t == tag));
        }
    }

    #[test]
    fn test_caption_count_is_capped_by_pool_size() {
        let tags: Vec<String> = vec!["#only".to_string()];
        let caption = generate_caption(&tags, &HashtagCount::Fixed(10));
        assert_eq!(caption, "#only");
    }

    #[test]
    fn test_caption_range_stays_in_bounds() {
        let tags: Vec<String> = ["#a", "#b", "#c", "#d", "#e"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for _ in 0..20 {
            let caption = generate_caption(&tags, &HashtagCount::Range([2, 3]));
            let n = caption.split_whitespace().count();
            assert!((2..=3).contains(&n), "sampled {n} tags");
        }
    }

    fn sample_config() -> Config {
        Config::from_toml(
            r##"
            [task_definitions.daily_photo]
            action = "upload_image"
            images_folder = "/photos"
            hashtag_group = "nature"

            [hashtag_groups]
            nature = ["#nature", "#sunset"]
        "##,
        )
        .expect("sample parses")
    }

    #[test]
    fn test_load_from_config_resolves_hashtag_group() {
        let config = sample_config();
        let task_def = &config.task_definitions["daily_photo"];

        let args = UploadImage.load_from_config(&config, task_def).expect("loads");
        assert_eq!(args["images_folder"], json!("/photos"));
        assert_eq!(args["hashtags"], json!(["#nature", "#sunset"]));
        // Unspecified count falls back to the default.
        assert_eq!(args["hashtag_count"], json!(DEFAULT_HASHTAG_COUNT));
    }

    #[test]
    fn test_load_from_config_rejects_missing_folder() {
        let config = Config::from_toml(
            r##"
            [task_definitions.broken]
            action = "upload_image"
            hashtag_group = "nature"

            [hashtag_groups]
            nature = ["#nature"]
        "##,
        )
        .expect("parses");

        let err = UploadImage
            .load_from_config(&config, &config.task_definitions["broken"])
            .expect_err("must fail");
        assert!(err.to_string().contains("images folder"));
    }

    #[test]
    fn test_load_from_config_rejects_unknown_group() {
        let config = Config::from_toml(
            r#"
            [task_definitions.broken]
            action = "upload_image"
            images_folder = "/photos"
            hashtag_group = "missing"
        "#,
        )
        .expect("parses");

        let err = UploadImage
            .load_from_config(&config, &config.task_definitions["broken"])
            .expect_err("must fail");
        assert!(err.to_string().contains("hashtag group not found"));
    }

    #[test]
    fn test_store_snapshot_drives_selection() {
        use postpilot_store::Store;

        // A snapshot from a previous run already recorded h1 as posted.
        let store = Store::with_state(json!({
            "account_data": {"A1": {"image_hashes": {"h1": true}}}
        }));
        let posted = store.get(["account_data", "A1", "image_hashes"], json!({}));

        let files = vec![remote("/photos/a.jpg", "h1"), remote("/photos/b.jpg", "h2")];
        let image = select_image(&files, &posted).expect("next candidate");
        assert_eq!(image.content_hash, "h2");
    }

    #[test]
    fn test_hashtag_count_accepts_range_syntax() {
        let count: HashtagCount = serde_json::from_value(json!([3, 8])).expect("range parses");
        assert!(matches!(count, HashtagCount::Range([3, 8])));

        let count: HashtagCount = serde_json::from_value(json!(4)).expect("fixed parses");
        assert!(matches!(count, HashtagCount::Fixed(4)));
    }
}
