//! # 工作流控制器
//!
//! ## 设计思路
//!
//! 展示层的所有事件都经由控制器：选图 → 预览 → 校验 → 提交 → 结果。
//! 三个模式相互独立，各自一把锁、各自最多一个在途请求。
//!
//! ## 实现思路
//!
//! - 锁只在同步区段内持有，`.await` 之前必然释放。
//! - 提交前同步执行完整校验，校验失败绝不发起网络请求。
//! - 提交时记录当前代数；返回时代数已变（换图 / 改参数 / 重置）则丢弃结果。
//! - `InFlightGuard` 采用 RAII：提交 future 被中途丢弃时也能清除在途标记。
//! - 锁中毒不 panic，映射为 `WorkflowError::StatePoisoned`。

use std::sync::{Mutex, MutexGuard};

use crate::asset::ImageAsset;
use crate::gateway::{BackendGateway, EmbedRequest, ExtractRequest, VerifyRequest};
use crate::preview::PreviewRegistry;
use crate::validation::{
    ExtractRole, RequestValidator, StrengthInput, StrengthParameter, ValidationReport, WatermarkText,
};

use super::slot::{EmbedSlot, ExtractSlot, ModeSlot, Selected, SlotCore, VerifySlot};
use super::state::{Mode, ModeSnapshot, Phase, WorkflowResult};

// ============================================================================
// 错误与结果
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Internal state of {0} mode is unavailable")]
    StatePoisoned(Mode),
}

/// 提交被拒绝的原因。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    /// 客户端校验未通过，报告中列出全部问题。
    #[error("{0}")]
    Rejected(ValidationReport),

    #[error("A {0} request is already in progress")]
    InFlight(Mode),

    /// 校验通过却无法组装请求，属于程序缺陷。
    #[error("Internal error: {0}")]
    Invariant(String),

    #[error(transparent)]
    State(#[from] WorkflowError),
}

/// 提交完成后的去向。
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// 结果已写入模式状态。
    Completed(WorkflowResult),
    /// 请求期间模式被重置或输入已变化，结果被丢弃。
    Discarded,
}

// ============================================================================
// InFlightGuard — 在途标记的 RAII 守卫
// ============================================================================

struct InFlightGuard<'a, S: ModeSlot> {
    mode: Mode,
    slot: &'a Mutex<S>,
    generation: u64,
    armed: bool,
}

impl<'a, S: ModeSlot> InFlightGuard<'a, S> {
    /// 写回结果并解除守卫。
    fn complete(mut self, result: WorkflowResult) -> Result<SubmitOutcome, SubmitError> {
        self.armed = false;

        let mut slot = lock_slot(self.mode, self.slot)?;
        let has_selection = slot.has_selection();
        let core = slot.core_mut();
        core.in_flight = None;

        if core.generation != self.generation {
            log::debug!("🗑️ 丢弃过期结果 - mode: {}", self.mode);
            if core.phase == Phase::Submitting {
                core.phase = SlotCore::resting_phase(has_selection);
            }
            return Ok(SubmitOutcome::Discarded);
        }

        core.phase = if result.is_failure() {
            Phase::Failed
        } else {
            Phase::Succeeded
        };
        core.result = Some(result.clone());
        Ok(SubmitOutcome::Completed(result))
    }
}

impl<S: ModeSlot> Drop for InFlightGuard<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        log::warn!("⚠️ 提交被中途取消 - mode: {}", self.mode);
        if let Ok(mut slot) = self.slot.lock() {
            let has_selection = slot.has_selection();
            let core = slot.core_mut();
            core.in_flight = None;
            if core.phase == Phase::Submitting {
                core.phase = SlotCore::resting_phase(has_selection);
            }
        }
    }
}

fn lock_slot<S>(mode: Mode, slot: &Mutex<S>) -> Result<MutexGuard<'_, S>, WorkflowError> {
    slot.lock().map_err(|_| {
        log::error!("❌ 模式状态锁已中毒 - mode: {}", mode);
        WorkflowError::StatePoisoned(mode)
    })
}

// ============================================================================
// WorkflowController
// ============================================================================

/// 三个模式的状态机，泛型参数为后端网关实现。
pub struct WorkflowController<G> {
    gateway: G,
    validator: RequestValidator,
    previews: PreviewRegistry,
    embed: Mutex<EmbedSlot>,
    extract: Mutex<ExtractSlot>,
    verify: Mutex<VerifySlot>,
}

impl<G: BackendGateway> WorkflowController<G> {
    pub fn new(gateway: G, validator: RequestValidator) -> Self {
        Self::with_previews(gateway, validator, PreviewRegistry::new())
    }

    /// 使用外部提供的预览注册表，便于展示层统一管理预览资源。
    pub fn with_previews(gateway: G, validator: RequestValidator, previews: PreviewRegistry) -> Self {
        Self {
            gateway,
            validator,
            previews,
            embed: Mutex::new(EmbedSlot::default()),
            extract: Mutex::new(ExtractSlot::default()),
            verify: Mutex::new(VerifySlot::default()),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    // ------------------------------------------------------------------------
    // 选图与参数
    // ------------------------------------------------------------------------

    /// 选择待嵌入的图片，返回新预览的 URI。旧预览随旧选择一并释放。
    pub fn select_embed_image(&self, asset: ImageAsset) -> Result<String, WorkflowError> {
        let mut slot = lock_slot(Mode::Embed, &self.embed)?;
        let selected = self.select("embed/image", asset);
        let uri = selected.preview.uri().to_string();

        slot.image = Some(selected);
        slot.core.invalidate(true);
        Ok(uri)
    }

    pub fn select_extract_image(&self, role: ExtractRole, asset: ImageAsset) -> Result<String, WorkflowError> {
        let mut slot = lock_slot(Mode::Extract, &self.extract)?;
        let scope = match role {
            ExtractRole::Original => "extract/original",
            ExtractRole::Suspect => "extract/suspect",
        };
        let selected = self.select(scope, asset);
        let uri = selected.preview.uri().to_string();

        *slot.role_mut(role) = Some(selected);
        slot.core.invalidate(true);
        Ok(uri)
    }

    pub fn select_verify_image(&self, asset: ImageAsset) -> Result<String, WorkflowError> {
        let mut slot = lock_slot(Mode::Verify, &self.verify)?;
        let selected = self.select("verify/image", asset);
        let uri = selected.preview.uri().to_string();

        slot.image = Some(selected);
        slot.core.invalidate(true);
        Ok(uri)
    }

    pub fn set_embed_text(&self, text: impl Into<String>) -> Result<(), WorkflowError> {
        let mut slot = lock_slot(Mode::Embed, &self.embed)?;
        slot.text = text.into();
        let has_selection = slot.has_selection();
        slot.core.invalidate(has_selection);
        Ok(())
    }

    pub fn set_embed_strength(&self, strength: impl Into<StrengthInput>) -> Result<(), WorkflowError> {
        let mut slot = lock_slot(Mode::Embed, &self.embed)?;
        slot.strength = strength.into();
        let has_selection = slot.has_selection();
        slot.core.invalidate(has_selection);
        Ok(())
    }

    fn select(&self, scope: &str, asset: ImageAsset) -> Selected {
        log::info!(
            "📁 选择图片 - {} 文件: {} 类型: {} 大小: {}",
            scope,
            asset.file_name(),
            asset.declared_type(),
            asset.size()
        );
        let preview = self.previews.acquire(scope, &asset);
        Selected { asset, preview }
    }

    // ------------------------------------------------------------------------
    // 提交
    // ------------------------------------------------------------------------

    pub async fn submit_embed(&self) -> Result<SubmitOutcome, SubmitError> {
        let (request, guard) = self.begin(
            Mode::Embed,
            &self.embed,
            |slot| {
                self.validator.validate_embed(
                    slot.image.as_ref().map(|selected| &selected.asset),
                    &slot.text,
                    &slot.strength,
                )
            },
            |slot| {
                let image = slot.image.as_ref().ok_or("embed image missing after validation")?;
                let text = WatermarkText::parse(&slot.text).map_err(|e| e.to_string())?;
                let strength = StrengthParameter::parse(&slot.strength).map_err(|e| e.to_string())?;
                Ok(EmbedRequest {
                    image: image.asset.clone(),
                    text,
                    strength,
                })
            },
        )?;

        let result = match self.gateway.embed(&request).await {
            Ok(outcome) => WorkflowResult::Embedded(outcome),
            Err(err) => WorkflowResult::Failure(err.into()),
        };
        guard.complete(result)
    }

    pub async fn submit_extract(&self) -> Result<SubmitOutcome, SubmitError> {
        let (request, guard) = self.begin(
            Mode::Extract,
            &self.extract,
            |slot| {
                self.validator.validate_extract(
                    slot.original.as_ref().map(|selected| &selected.asset),
                    slot.suspect.as_ref().map(|selected| &selected.asset),
                )
            },
            |slot| match (&slot.original, &slot.suspect) {
                (Some(original), Some(suspect)) => Ok(ExtractRequest {
                    original: original.asset.clone(),
                    suspect: suspect.asset.clone(),
                }),
                _ => Err("extract images missing after validation".to_string()),
            },
        )?;

        let result = match self.gateway.extract(&request).await {
            Ok(outcome) => WorkflowResult::Extracted(outcome),
            Err(err) => WorkflowResult::Failure(err.into()),
        };
        guard.complete(result)
    }

    pub async fn submit_verify(&self) -> Result<SubmitOutcome, SubmitError> {
        let (request, guard) = self.begin(
            Mode::Verify,
            &self.verify,
            |slot| {
                self.validator
                    .validate_verify(slot.image.as_ref().map(|selected| &selected.asset))
            },
            |slot| {
                let image = slot.image.as_ref().ok_or("verify image missing after validation")?;
                Ok(VerifyRequest {
                    image: image.asset.clone(),
                })
            },
        )?;

        let result = match self.gateway.verify(&request).await {
            Ok(outcome) => WorkflowResult::Verified(outcome),
            Err(err) => WorkflowResult::Failure(err.into()),
        };
        guard.complete(result)
    }

    /// 提交的同步前半段：在途检查 → 校验 → 组装请求 → 标记在途。
    fn begin<'a, S, R, V, B>(
        &self,
        mode: Mode,
        slot: &'a Mutex<S>,
        validate: V,
        build: B,
    ) -> Result<(R, InFlightGuard<'a, S>), SubmitError>
    where
        S: ModeSlot,
        V: FnOnce(&S) -> ValidationReport,
        B: FnOnce(&S) -> Result<R, String>,
    {
        let mut guard = lock_slot(mode, slot)?;

        if guard.core().is_busy() {
            log::warn!("⚠️ 已有请求在途，忽略重复提交 - mode: {}", mode);
            return Err(SubmitError::InFlight(mode));
        }

        guard.core_mut().phase = Phase::Validating;
        let report = validate(&*guard);
        let has_selection = guard.has_selection();

        if !report.valid {
            log::warn!("⚠️ 提交前校验未通过 - mode: {}, 错误: {}", mode, report);
            let core = guard.core_mut();
            core.phase = SlotCore::resting_phase(has_selection);
            core.result = None;
            core.rejection = Some(report.clone());
            return Err(SubmitError::Rejected(report));
        }

        let request = match build(&*guard) {
            Ok(request) => request,
            Err(message) => {
                log::error!("❌ 校验通过但无法组装请求 - mode: {}, 原因: {}", mode, message);
                guard.core_mut().phase = SlotCore::resting_phase(has_selection);
                return Err(SubmitError::Invariant(message));
            }
        };

        let core = guard.core_mut();
        core.result = None;
        core.rejection = None;
        core.phase = Phase::Submitting;
        core.in_flight = Some(core.generation);
        let generation = core.generation;

        log::info!("🚀 开始提交 - mode: {}", mode);
        Ok((
            request,
            InFlightGuard {
                mode,
                slot,
                generation,
                armed: true,
            },
        ))
    }

    // ------------------------------------------------------------------------
    // 重置与查询
    // ------------------------------------------------------------------------

    /// 回到 `Idle`：释放已选文件与预览，清空参数与结果，使在途结果失效。
    pub fn reset(&self, mode: Mode) -> Result<(), WorkflowError> {
        match mode {
            Mode::Embed => lock_slot(mode, &self.embed)?.clear(),
            Mode::Extract => lock_slot(mode, &self.extract)?.clear(),
            Mode::Verify => lock_slot(mode, &self.verify)?.clear(),
        }
        log::info!("🧹 模式已重置 - {}", mode);
        Ok(())
    }

    pub fn reset_all(&self) -> Result<(), WorkflowError> {
        Mode::ALL.into_iter().try_for_each(|mode| self.reset(mode))
    }

    pub fn snapshot(&self, mode: Mode) -> Result<ModeSnapshot, WorkflowError> {
        match mode {
            Mode::Embed => {
                let slot = lock_slot(mode, &self.embed)?;
                Ok(snapshot_of(mode, &*slot, Some(slot.text.clone())))
            }
            Mode::Extract => Ok(snapshot_of(mode, &*lock_slot(mode, &self.extract)?, None)),
            Mode::Verify => Ok(snapshot_of(mode, &*lock_slot(mode, &self.verify)?, None)),
        }
    }

    /// 在途标记。状态锁不可用时按忙碌处理，展示层将禁用提交。
    pub fn is_busy(&self, mode: Mode) -> bool {
        let busy = match mode {
            Mode::Embed => lock_slot(mode, &self.embed).map(|slot| slot.core.is_busy()),
            Mode::Extract => lock_slot(mode, &self.extract).map(|slot| slot.core.is_busy()),
            Mode::Verify => lock_slot(mode, &self.verify).map(|slot| slot.core.is_busy()),
        };
        busy.unwrap_or(true)
    }
}

fn snapshot_of<S: ModeSlot>(mode: Mode, slot: &S, text: Option<String>) -> ModeSnapshot {
    let core = slot.core();
    ModeSnapshot {
        mode,
        phase: core.phase,
        busy: core.is_busy(),
        files: slot.summaries(),
        text,
        rejection: core.rejection.clone(),
        result: core.result.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{
        EmbedOutcome, ExtractOutcome, GatewayError, HealthReport, VerifyOutcome,
    };
    use crate::validation::FileConstraintValidator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 立即返回的网关，记录调用次数。
    #[derive(Default)]
    struct InstantGateway {
        calls: AtomicUsize,
        fail_with: Option<GatewayError>,
    }

    impl BackendGateway for InstantGateway {
        async fn health(&self) -> Result<HealthReport, GatewayError> {
            Ok(HealthReport {
                status: "ok".into(),
                service: "test".into(),
            })
        }

        async fn embed(&self, request: &EmbedRequest) -> Result<EmbedOutcome, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(EmbedOutcome {
                image_url: format!("http://backend/static/{}", request.image.file_name()),
                psnr: 40.0,
                ssim: 0.98,
                signal_map_url: None,
            })
        }

        async fn extract(&self, _request: &ExtractRequest) -> Result<ExtractOutcome, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Transport("unused".into()))
        }

        async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyOutcome, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Transport("unused".into()))
        }
    }

    fn png(name: &str, size: usize) -> ImageAsset {
        ImageAsset::new(name, "image/png", vec![0u8; size])
    }

    fn controller(gateway: InstantGateway) -> WorkflowController<InstantGateway> {
        WorkflowController::new(gateway, RequestValidator::new(FileConstraintValidator::new()))
    }

    #[tokio::test]
    async fn embed_success_stores_result() {
        let ctrl = controller(InstantGateway::default());
        ctrl.select_embed_image(png("cat.png", 500 * 1024)).expect("select failed");
        ctrl.set_embed_text("hello").expect("set text failed");
        ctrl.set_embed_strength(1.0).expect("set strength failed");

        let outcome = ctrl.submit_embed().await.expect("submit failed");
        assert!(matches!(outcome, SubmitOutcome::Completed(WorkflowResult::Embedded(_))));

        let snapshot = ctrl.snapshot(Mode::Embed).expect("snapshot failed");
        assert_eq!(snapshot.phase, Phase::Succeeded);
        assert!(!snapshot.busy);
        assert_eq!(snapshot.files[0].size_label, "500 KB");
        assert_eq!(ctrl.gateway().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_submission_never_reaches_gateway() {
        let ctrl = controller(InstantGateway::default());
        ctrl.set_embed_strength("abc").expect("set strength failed");

        let err = ctrl.submit_embed().await.expect_err("should be rejected");
        let SubmitError::Rejected(report) = err else {
            panic!("expected rejection, got {:?}", err);
        };
        assert_eq!(
            report.errors,
            vec![
                "No file selected".to_string(),
                "Watermark text cannot be empty".to_string(),
                "Alpha value must be a number".to_string(),
            ]
        );

        let snapshot = ctrl.snapshot(Mode::Embed).expect("snapshot failed");
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.rejection, Some(report));
        assert_eq!(ctrl.gateway().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn business_failure_is_stored_as_failed() {
        let ctrl = controller(InstantGateway {
            fail_with: Some(GatewayError::Business {
                status: 400,
                code: Some("INVALID_IMAGE".into()),
                message: "Could not decode image".into(),
                suggestion: None,
            }),
            ..InstantGateway::default()
        });
        ctrl.select_embed_image(png("cat.png", 1024)).expect("select failed");
        ctrl.set_embed_text("hello").expect("set text failed");

        let outcome = ctrl.submit_embed().await.expect("submit failed");
        assert!(matches!(
            outcome,
            SubmitOutcome::Completed(WorkflowResult::Failure(crate::workflow::Failure::Business { .. }))
        ));
        assert_eq!(ctrl.snapshot(Mode::Embed).expect("snapshot failed").phase, Phase::Failed);
    }

    #[tokio::test]
    async fn editing_text_clears_stored_result() {
        let ctrl = controller(InstantGateway::default());
        ctrl.select_embed_image(png("cat.png", 1024)).expect("select failed");
        ctrl.set_embed_text("hello").expect("set text failed");
        ctrl.submit_embed().await.expect("submit failed");

        ctrl.set_embed_text("hello again").expect("set text failed");

        let snapshot = ctrl.snapshot(Mode::Embed).expect("snapshot failed");
        assert_eq!(snapshot.result, None);
        assert_eq!(snapshot.phase, Phase::FilesSelected);
        assert_eq!(snapshot.text.as_deref(), Some("hello again"));
    }

    #[test]
    fn reset_releases_previews_and_restores_defaults() {
        let ctrl = controller(InstantGateway::default());
        ctrl.select_extract_image(ExtractRole::Original, png("a.png", 10))
            .expect("select failed");
        ctrl.select_extract_image(ExtractRole::Suspect, png("b.png", 10))
            .expect("select failed");
        ctrl.select_verify_image(png("c.png", 10)).expect("select failed");
        assert_eq!(ctrl.previews().live_count(), 3);

        ctrl.reset(Mode::Extract).expect("reset failed");
        assert_eq!(ctrl.previews().live_count(), 1);

        ctrl.reset_all().expect("reset failed");
        assert_eq!(ctrl.previews().live_count(), 0);
        for mode in Mode::ALL {
            let snapshot = ctrl.snapshot(mode).expect("snapshot failed");
            assert_eq!(snapshot.phase, Phase::Idle);
            assert!(snapshot.files.is_empty());
        }
    }

    #[test]
    fn extract_snapshot_lists_files_in_role_order() {
        let ctrl = controller(InstantGateway::default());
        let suspect_uri = ctrl
            .select_extract_image(ExtractRole::Suspect, png("suspect.png", 10))
            .expect("select failed");
        ctrl.select_extract_image(ExtractRole::Original, png("original.png", 10))
            .expect("select failed");

        let snapshot = ctrl.snapshot(Mode::Extract).expect("snapshot failed");
        let slots: Vec<_> = snapshot.files.iter().map(|f| (f.slot, f.file_name.as_str())).collect();
        assert_eq!(slots, vec![("original", "original.png"), ("suspect", "suspect.png")]);
        assert_eq!(snapshot.files[1].preview_uri, suspect_uri);
        assert!(suspect_uri.starts_with("preview://extract/suspect/"));
    }
}
