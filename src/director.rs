//! The movie pipeline: scrape, paint one still per scene, animate each still,
//! then hand the clips to the stitcher.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{info, warn};

use crate::error::{TrailerError, TrailerResult};
use crate::media::MediaGenerator;
use crate::scenes::Scene;
use crate::scraper::ProfileSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ScrapeProfile,
    GenerateImages,
    GenerateVideos,
    StitchVideos,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ScrapeProfile => "scrape profile",
            Stage::GenerateImages => "generate images",
            Stage::GenerateVideos => "generate videos",
            Stage::StitchVideos => "stitch videos",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A generated still or clip, tagged with the scene it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMedia {
    pub scene: String,
    pub data_url: String,
}

/// Joins the per-scene clips into the final video.
pub trait Stitcher: Send + Sync {
    fn stitch(&self, clips: &[GeneratedMedia]) -> TrailerResult<String>;
}

/// Placeholder stitcher: concatenation is not implemented yet, so only the
/// first clip is returned and the rest are dropped.
pub struct FirstClipStitcher;

impl Stitcher for FirstClipStitcher {
    fn stitch(&self, clips: &[GeneratedMedia]) -> TrailerResult<String> {
        let first = clips.first().ok_or(TrailerError::NothingToStitch)?;
        if clips.len() > 1 {
            let dropped: Vec<&str> = clips[1..].iter().map(|c| c.scene.as_str()).collect();
            warn!(
                "Clip concatenation is not implemented; returning {} and dropping {}",
                first.scene,
                dropped.join(", ")
            );
        }
        Ok(first.data_url.clone())
    }
}

pub struct MovieDirector {
    profiles: Arc<dyn ProfileSource>,
    images: Arc<dyn MediaGenerator>,
    videos: Arc<dyn MediaGenerator>,
    stitcher: Box<dyn Stitcher>,
    scenes: Vec<Scene>,
    max_parallel: usize,
}

impl MovieDirector {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        images: Arc<dyn MediaGenerator>,
        videos: Arc<dyn MediaGenerator>,
        scenes: Vec<Scene>,
    ) -> Self {
        Self {
            profiles,
            images,
            videos,
            stitcher: Box::new(FirstClipStitcher),
            scenes,
            max_parallel: 0,
        }
    }

    /// Caps in-flight generation calls per stage; `0` means one per scene.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_stitcher(mut self, stitcher: Box<dyn Stitcher>) -> Self {
        self.stitcher = stitcher;
        self
    }

    pub async fn create_movie(&self, linkedin_url: &str) -> TrailerResult<String> {
        info!("Stage: {}", Stage::ScrapeProfile);
        let profile = self.profiles.fetch(linkedin_url).await?;
        let picture = profile
            .profile_picture()
            .ok_or(TrailerError::MissingProfilePicture)?;

        info!("Stage: {} ({} scenes)", Stage::GenerateImages, self.scenes.len());
        let images = self.generate_images(picture).await?;

        info!("Stage: {} ({} images)", Stage::GenerateVideos, images.len());
        let videos = self.generate_videos(&images).await?;

        info!("Stage: {}", Stage::StitchVideos);
        let movie = self.stitcher.stitch(&videos)?;

        info!("Stage: {}", Stage::Done);
        Ok(movie)
    }

    pub async fn generate_images(&self, profile_picture: &str) -> TrailerResult<Vec<GeneratedMedia>> {
        let stills = fan_out(&self.scenes, self.max_parallel, |scene| async move {
            info!("Generating image for scene: {}", scene.name);
            let references = vec![
                scene.spec.movie_reference_image.clone(),
                profile_picture.to_string(),
            ];
            let data_url = self.images.generate(&references, &scene.spec.prompt).await?;
            info!("Generated image for {}", scene.name);
            Ok::<_, TrailerError>(data_url)
        })
        .await?;

        Ok(self
            .scenes
            .iter()
            .zip(stills)
            .map(|(scene, data_url)| GeneratedMedia {
                scene: scene.name.clone(),
                data_url,
            })
            .collect())
    }

    pub async fn generate_videos(&self, images: &[GeneratedMedia]) -> TrailerResult<Vec<GeneratedMedia>> {
        let clips = fan_out(images, self.max_parallel, |image| async move {
            let scene = self
                .scenes
                .iter()
                .find(|s| s.name == image.scene)
                .ok_or_else(|| {
                    TrailerError::configuration(format!("Scene data not found for: {}", image.scene))
                })?;
            info!("Generating video for scene: {}", image.scene);
            let data_url = self
                .videos
                .generate(std::slice::from_ref(&image.data_url), &scene.spec.prompt)
                .await?;
            info!("Generated video for {}", image.scene);
            Ok::<_, TrailerError>(data_url)
        })
        .await?;

        Ok(images
            .iter()
            .zip(clips)
            .map(|(image, data_url)| GeneratedMedia {
                scene: image.scene.clone(),
                data_url,
            })
            .collect())
    }
}

/// Runs `task` over every item with at most `limit` in flight and returns the
/// results in input order. The first error wins and the rest are dropped.
async fn fan_out<'a, T, R, F, Fut>(items: &'a [T], limit: usize, task: F) -> TrailerResult<Vec<R>>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = TrailerResult<R>>,
{
    let limit = if limit == 0 { items.len().max(1) } else { limit };
    // Built eagerly so the stream holds plain futures rather than a borrowing closure.
    let pending: Vec<_> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let fut = task(item);
            async move { fut.await.map(|out| (idx, out)) }
        })
        .collect();
    let mut indexed: Vec<(usize, R)> = stream::iter(pending)
        .buffer_unordered(limit)
        .try_collect()
        .await?;
    indexed.sort_by_key(|(idx, _)| *idx);
    Ok(indexed.into_iter().map(|(_, out)| out).collect())
}
