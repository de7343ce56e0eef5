//! # 模式状态槽
//!
//! 每个模式独占一个槽：已选文件（含预览句柄）、输入参数、阶段与结果。
//! 槽之间从不共享数据，即便逻辑上指向同一张图也各自持有资源。
//!
//! `generation` 在任何会让旧结果失效的操作（换图、改参数、重置）时递增；
//! 请求提交时记下当时的代数，返回时代数不一致即丢弃结果。

use crate::asset::{format_file_size, ImageAsset};
use crate::preview::PreviewHandle;
use crate::validation::{ExtractRole, StrengthInput, ValidationReport};

use super::state::{Phase, SelectedFileSummary, WorkflowResult, DEFAULT_ALPHA};

/// 已选图片及其预览句柄。丢弃即释放预览。
#[derive(Debug)]
pub(crate) struct Selected {
    pub(crate) asset: ImageAsset,
    pub(crate) preview: PreviewHandle,
}

impl Selected {
    pub(crate) fn summary(&self, slot: &'static str) -> SelectedFileSummary {
        SelectedFileSummary {
            slot,
            file_name: self.asset.file_name().to_string(),
            declared_type: self.asset.declared_type().to_string(),
            size: self.asset.size(),
            size_label: format_file_size(self.asset.size()),
            preview_uri: self.preview.uri().to_string(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SlotCore {
    pub(crate) phase: Phase,
    pub(crate) generation: u64,
    /// 在途请求提交时的代数。
    pub(crate) in_flight: Option<u64>,
    pub(crate) result: Option<WorkflowResult>,
    pub(crate) rejection: Option<ValidationReport>,
}

impl Default for SlotCore {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            in_flight: None,
            result: None,
            rejection: None,
        }
    }
}

impl SlotCore {
    /// 输入已变化：丢弃旧结果 / 校验报告，并使在途结果失效。
    pub(crate) fn invalidate(&mut self, has_selection: bool) {
        self.generation = self.generation.wrapping_add(1);
        self.result = None;
        self.rejection = None;
        if self.in_flight.is_none() || !matches!(self.phase, Phase::Submitting) {
            self.phase = Self::resting_phase(has_selection);
        }
    }

    /// 回到 `Idle`。在途标记保留：请求仍未返回。
    pub(crate) fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.result = None;
        self.rejection = None;
        self.phase = Phase::Idle;
    }

    pub(crate) fn resting_phase(has_selection: bool) -> Phase {
        if has_selection {
            Phase::FilesSelected
        } else {
            Phase::Idle
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// 三个模式槽的公共访问面，供控制器复用提交流程。
pub(crate) trait ModeSlot {
    fn core(&self) -> &SlotCore;
    fn core_mut(&mut self) -> &mut SlotCore;
    fn has_selection(&self) -> bool;
    fn summaries(&self) -> Vec<SelectedFileSummary>;
    fn clear(&mut self);
}

#[derive(Debug)]
pub(crate) struct EmbedSlot {
    pub(crate) core: SlotCore,
    pub(crate) image: Option<Selected>,
    pub(crate) text: String,
    pub(crate) strength: StrengthInput,
}

impl Default for EmbedSlot {
    fn default() -> Self {
        Self {
            core: SlotCore::default(),
            image: None,
            text: String::new(),
            strength: StrengthInput::Number(DEFAULT_ALPHA),
        }
    }
}

impl ModeSlot for EmbedSlot {
    fn core(&self) -> &SlotCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SlotCore {
        &mut self.core
    }

    fn has_selection(&self) -> bool {
        self.image.is_some()
    }

    fn summaries(&self) -> Vec<SelectedFileSummary> {
        self.image.iter().map(|selected| selected.summary("image")).collect()
    }

    fn clear(&mut self) {
        self.image = None;
        self.text.clear();
        self.strength = StrengthInput::Number(DEFAULT_ALPHA);
        self.core.reset();
    }
}

#[derive(Debug, Default)]
pub(crate) struct ExtractSlot {
    pub(crate) core: SlotCore,
    pub(crate) original: Option<Selected>,
    pub(crate) suspect: Option<Selected>,
}

impl ExtractSlot {
    pub(crate) fn role_mut(&mut self, role: ExtractRole) -> &mut Option<Selected> {
        match role {
            ExtractRole::Original => &mut self.original,
            ExtractRole::Suspect => &mut self.suspect,
        }
    }
}

impl ModeSlot for ExtractSlot {
    fn core(&self) -> &SlotCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SlotCore {
        &mut self.core
    }

    fn has_selection(&self) -> bool {
        self.original.is_some() || self.suspect.is_some()
    }

    fn summaries(&self) -> Vec<SelectedFileSummary> {
        let original = self.original.iter().map(|selected| selected.summary("original"));
        let suspect = self.suspect.iter().map(|selected| selected.summary("suspect"));
        original.chain(suspect).collect()
    }

    fn clear(&mut self) {
        self.original = None;
        self.suspect = None;
        self.core.reset();
    }
}

#[derive(Debug, Default)]
pub(crate) struct VerifySlot {
    pub(crate) core: SlotCore,
    pub(crate) image: Option<Selected>,
}

impl ModeSlot for VerifySlot {
    fn core(&self) -> &SlotCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SlotCore {
        &mut self.core
    }

    fn has_selection(&self) -> bool {
        self.image.is_some()
    }

    fn summaries(&self) -> Vec<SelectedFileSummary> {
        self.image.iter().map(|selected| selected.summary("image")).collect()
    }

    fn clear(&mut self) {
        self.image = None;
        self.core.reset();
    }
}
