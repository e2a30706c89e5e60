// Tensor tests — light/graph duality, type promotion and node lifecycle

use rstest::rstest;

use ember::prelude::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn one(dtype: DType) -> Scalar {
    Scalar::I32(1).cast(dtype)
}

// Promotion tables

#[rstest]
#[case(DType::I32, DType::I32, DType::I32)]
#[case(DType::I32, DType::I64, DType::I64)]
#[case(DType::I64, DType::F32, DType::F32)]
#[case(DType::F32, DType::I32, DType::F32)]
#[case(DType::F32, DType::F64, DType::F64)]
#[case(DType::I64, DType::F64, DType::F64)]
#[case(DType::F64, DType::I32, DType::F64)]
fn test_graph_arithmetic_promotes(#[case] a: DType, #[case] b: DType, #[case] expected: DType) -> Result<()> {
    init();
    let e = CpuEngine::new();
    let x = Tensor::constant(&e, one(a), 3)?;
    let y = Tensor::constant(&e, one(b), 3)?;
    for r in [x.add(&y)?, x.sub(&y)?, x.mul(&y)?, x.maximum(&y)?] {
        assert_eq!(r.dtype(), expected);
    }
    let sum = x.add(&y)?;
    assert_eq!(sum.to_vec_f64()?, vec![2.0; 3]);
    Ok(())
}

#[rstest]
#[case(Scalar::I32(3), Scalar::I64(4), Scalar::I64(7))]
#[case(Scalar::I32(3), Scalar::F32(0.5), Scalar::F32(3.5))]
#[case(Scalar::F32(1.5), Scalar::F64(0.25), Scalar::F64(1.75))]
#[case(Scalar::I64(-2), Scalar::I32(2), Scalar::I64(0))]
fn test_light_arithmetic_stays_light(#[case] a: Scalar, #[case] b: Scalar, #[case] sum: Scalar) -> Result<()> {
    init();
    let e = CpuEngine::new();
    let r = Tensor::scalar(&e, a).add(&Tensor::scalar(&e, b))?;
    assert!(r.is_light());
    assert_eq!(r.as_scalar(), Some(sum));
    assert_eq!(e.live_nodes()?, 0);
    Ok(())
}

#[rstest]
#[case(BinaryOp::Add, Scalar::I32(i32::MAX), Scalar::I32(1), Scalar::I32(i32::MIN))]
#[case(BinaryOp::Sub, Scalar::I32(i32::MIN), Scalar::I32(1), Scalar::I32(i32::MAX))]
#[case(BinaryOp::Mul, Scalar::I32(i32::MAX), Scalar::I32(2), Scalar::I32(-2))]
#[case(BinaryOp::Div, Scalar::I32(i32::MIN), Scalar::I32(-1), Scalar::I32(i32::MIN))]
#[case(BinaryOp::Add, Scalar::I64(i64::MAX), Scalar::I64(1), Scalar::I64(i64::MIN))]
#[case(BinaryOp::Mul, Scalar::I64(i64::MAX), Scalar::I32(2), Scalar::I64(-2))]
#[case(BinaryOp::Div, Scalar::I64(i64::MIN), Scalar::I64(-1), Scalar::I64(i64::MIN))]
#[case(BinaryOp::Pow, Scalar::I32(2), Scalar::I32(40), Scalar::I32(i32::MAX))]
fn test_light_and_graph_overflow_agree(
    #[case] op: BinaryOp,
    #[case] a: Scalar,
    #[case] b: Scalar,
    #[case] expected: Scalar,
) -> Result<()> {
    init();
    let e = CpuEngine::new();
    let light = Tensor::scalar(&e, a).binary(op, &Tensor::scalar(&e, b))?;
    assert_eq!(light.as_scalar(), Some(expected));
    let graph = Tensor::constant(&e, a, 1)?.binary(op, &Tensor::scalar(&e, b))?;
    assert_eq!(graph.read()?.get(0), Some(expected));
    Ok(())
}

#[rstest]
#[case(DType::I32)]
#[case(DType::I64)]
#[case(DType::F32)]
#[case(DType::F64)]
fn test_scalar_operand_of_every_type(#[case] dtype: DType) -> Result<()> {
    init();
    let e = CpuEngine::new();
    let node = GraphNode::store(&e, vec![1.0f32, 2.0], 2)?;
    let r = node.mul(one(dtype).binary(BinaryOp::Mul, Scalar::I32(3))?)?;
    assert_eq!(r.dtype(), DType::promote(DType::F32, dtype));
    assert_eq!(r.to_vec_f64()?, vec![3.0, 6.0]);
    Ok(())
}

#[test]
fn test_unsupported_operand_type() {
    init();
    let values: [&dyn std::any::Any; 4] = [&7u8, &"seven", &7u64, &true];
    for value in values {
        assert!(matches!(
            Scalar::from_any(value),
            Err(Error::UnsupportedOperandType(_))
        ));
    }
}

#[test]
fn test_two_scalars_need_a_node() {
    init();
    let r: Result<CpuNode> = ember::dispatch::add(1i32, 2i32);
    assert!(matches!(r, Err(Error::UnsupportedOperandType(_))));
}

#[test]
fn test_light_integer_division_by_zero() {
    init();
    let e = CpuEngine::new();
    let r = Tensor::scalar(&e, 1i32).div(&Tensor::scalar(&e, 0i32));
    assert!(matches!(r, Err(Error::DivisionByZero)));
}

// Light/graph mixing and promotion

#[test]
fn test_light_meets_graph() -> Result<()> {
    init();
    let e = CpuEngine::new();
    let g = Tensor::from_vec(&e, vec![1i64, 2, 3, 4], (2, 2))?;
    let half = Tensor::scalar(&e, 0.5f64);
    let r = half.mul(&g)?;
    assert!(!r.is_light());
    assert!(half.is_light());
    assert_eq!(r.shape().dims(), &[2, 2]);
    assert_eq!(r.dtype(), DType::F64);
    assert_eq!(r.to_vec_f64()?, vec![0.5, 1.0, 1.5, 2.0]);
    Ok(())
}

#[test]
fn test_promote_is_one_way() -> Result<()> {
    init();
    let e = CpuEngine::new();
    let mut s = Tensor::scalar(&e, 4i32);
    assert_eq!(s.shape().dims(), &[1]);
    s.promote((2, 3))?;
    assert!(!s.is_light());
    assert_eq!(s.shape().dims(), &[2, 3]);
    // promoting again leaves the node alone
    s.promote(1)?;
    assert_eq!(s.shape().dims(), &[2, 3]);
    assert_eq!(s.to_vec::<i32>()?, vec![4; 6]);
    Ok(())
}

#[test]
fn test_unary_on_light_tensor() -> Result<()> {
    init();
    let e = CpuEngine::new();
    let r = Tensor::scalar(&e, -3.0f32).abs()?;
    assert_eq!(r.shape().dims(), &[1]);
    assert_eq!(r.to_vec::<f32>()?, vec![3.0]);
    let c = Tensor::scalar(&e, 2.9f64).convert(DType::I32)?;
    assert_eq!(c.as_scalar(), Some(Scalar::I32(2)));
    Ok(())
}

// Lifecycle

#[test]
fn test_close_then_use() -> Result<()> {
    init();
    let e = CpuEngine::new();
    let mut a = Tensor::from_vec(&e, vec![1.0f32, 2.0], 2)?;
    a.close()?;
    assert_eq!(a.to_vec_f64().unwrap_err(), Error::UseAfterRelease);
    assert!(a.add(&Tensor::scalar(&e, 1.0f32)).unwrap_err().is_fatal());
    assert_eq!(e.live_nodes()?, 0);
    Ok(())
}

#[test]
fn test_shared_tensor_survives_close() -> Result<()> {
    init();
    let e = CpuEngine::new();
    let mut a = Tensor::from_vec(&e, vec![5i32, 6], 2)?;
    let b = a.share()?;
    a.close()?;
    assert_eq!(b.to_vec::<i32>()?, vec![5, 6]);
    drop(b);
    assert_eq!(e.live_nodes()?, 0);
    Ok(())
}

#[test]
fn test_temporary_constants_are_released() -> Result<()> {
    init();
    let e = CpuEngine::new();
    let g = Tensor::from_vec(&e, vec![1.0f64, 2.0, 3.0], 3)?;
    let r = g.add(&Tensor::scalar(&e, 1.0f64))?;
    drop(g);
    assert_eq!(r.to_vec_f64()?, vec![2.0, 3.0, 4.0]);
    drop(r);
    assert_eq!(e.live_nodes()?, 0);
    Ok(())
}

#[test]
fn test_validation_errors_are_recoverable() -> Result<()> {
    init();
    let e = CpuEngine::new();
    let a = Tensor::from_vec(&e, vec![1, 2, 3, 4, 5, 6], (2, 3))?;
    let err = a.reshape((4, 2)).unwrap_err();
    assert!(!err.is_fatal());
    // the operand is untouched and the corrected call succeeds
    assert_eq!(a.reshape((3, 2))?.to_vec::<i32>()?, vec![1, 2, 3, 4, 5, 6]);
    Ok(())
}
